use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// JSON logs on stdout, filtered by `RUST_LOG` (default `info`).
pub fn init_telemetry() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .init();
}

/// Like [`init_telemetry`] but tolerates an already installed subscriber,
/// so every integration test can call it. Silent unless `TEST_LOG` is set.
pub fn init_test_telemetry() {
    if std::env::var("TEST_LOG").is_err() {
        return;
    }

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("debug"))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
