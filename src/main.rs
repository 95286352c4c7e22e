use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use vidtube::configuration::{get_configuration, StorageBackend};
use vidtube::startup::{run, AppState};
use vidtube::store::{InMemoryStore, PgStore};
use vidtube::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    // A bad secret or lifetime stops us before anything binds
    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!(jwt = ?config.jwt, "Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let state = match configuration.application.storage {
        StorageBackend::Postgres => {
            tracing::info!("Attempting to connect to database");

            let pool = PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(
                    configuration.database.acquire_timeout_seconds,
                ))
                .connect(&configuration.database.connection_string())
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create connection pool: {}", e);
                    std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "Database connection error",
                    )
                })?;

            sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
            })?;

            tracing::info!("Database ready");
            let store = Arc::new(PgStore::new(pool));
            AppState::new(
                &configuration.application,
                &configuration.jwt,
                store.clone(),
                store.clone(),
                store,
            )
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            AppState::in_memory(
                &configuration.application,
                &configuration.jwt,
                Arc::new(InMemoryStore::new()),
            )
        }
    };

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, state)?.await
}
