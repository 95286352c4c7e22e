use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{AuthService, TokenIssuer};
use crate::configuration::{ApplicationSettings, JwtSettings};
use crate::error::{AppError, ValidationError};
use crate::middleware::{AuthGuard, RequestLogger};
use crate::relationships::RelationshipToggle;
use crate::routes::{
    change_password, channel_subscribers, current_user, health_check, liked_videos, login, logout,
    refresh_token, register, subscribed_channels, toggle_comment_like, toggle_subscription,
    toggle_tweet_like, toggle_video_like, update_account, update_avatar, update_cover_image,
};
use crate::store::{EdgeStore, IdentityStore, InMemoryStore, TargetDirectory};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub relationships: RelationshipToggle,
    pub issuer: Arc<TokenIssuer>,
    pub identities: Arc<dyn IdentityStore>,
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(
        application: &ApplicationSettings,
        jwt: &JwtSettings,
        identities: Arc<dyn IdentityStore>,
        edges: Arc<dyn EdgeStore>,
        targets: Arc<dyn TargetDirectory>,
    ) -> Self {
        let issuer = Arc::new(TokenIssuer::new(jwt));
        let auth = AuthService::new(identities.clone(), issuer.clone())
            .with_bcrypt_cost(application.bcrypt_cost);

        Self {
            auth,
            relationships: RelationshipToggle::new(edges, targets),
            issuer,
            identities,
            secure_cookies: application.secure_cookies,
        }
    }

    /// Identities, edges and content all in one process-local store
    pub fn in_memory(
        application: &ApplicationSettings,
        jwt: &JwtSettings,
        store: Arc<InMemoryStore>,
    ) -> Self {
        Self::new(application, jwt, store.clone(), store.clone(), store)
    }
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        tracing::warn!(error = %err, "Rejected request body");
        AppError::from(ValidationError::InvalidFormat("request body".to_string())).into()
    })
}

pub fn run(listener: TcpListener, state: AppState) -> Result<Server, std::io::Error> {
    let guard = AuthGuard::new(state.issuer.clone(), state.identities.clone());
    let state = web::Data::new(state);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestLogger)
            .app_data(state.clone())
            .app_data(json_config())
            .service(
                web::scope("/api/v1")
                    .route("/healthcheck", web::get().to(health_check))
                    .service(
                        web::scope("/users")
                            // Public
                            .route("/register", web::post().to(register))
                            .route("/login", web::post().to(login))
                            .route("/refresh-token", web::post().to(refresh_token))
                            // Require an access token
                            .service(
                                web::resource("/logout")
                                    .wrap(guard.clone())
                                    .route(web::post().to(logout)),
                            )
                            .service(
                                web::resource("/change-password")
                                    .wrap(guard.clone())
                                    .route(web::post().to(change_password)),
                            )
                            .service(
                                web::resource("/current-user")
                                    .wrap(guard.clone())
                                    .route(web::get().to(current_user)),
                            )
                            .service(
                                web::resource("/update-account")
                                    .wrap(guard.clone())
                                    .route(web::patch().to(update_account)),
                            )
                            .service(
                                web::resource("/avatar")
                                    .wrap(guard.clone())
                                    .route(web::patch().to(update_avatar)),
                            )
                            .service(
                                web::resource("/cover-image")
                                    .wrap(guard.clone())
                                    .route(web::patch().to(update_cover_image)),
                            ),
                    )
                    .service(
                        web::scope("/likes")
                            .wrap(guard.clone())
                            .route("/toggle/v/{videoId}", web::post().to(toggle_video_like))
                            .route("/toggle/c/{commentId}", web::post().to(toggle_comment_like))
                            .route("/toggle/t/{tweetId}", web::post().to(toggle_tweet_like))
                            .route("/videos", web::get().to(liked_videos)),
                    )
                    .service(
                        web::scope("/subscriptions")
                            .wrap(guard.clone())
                            .route("/c/{channelId}", web::post().to(toggle_subscription))
                            .route("/c/{channelId}", web::get().to(channel_subscribers))
                            .route("/u/{subscriberId}", web::get().to(subscribed_channels)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
