/// Subscription Routes
///
/// A subscription is an edge from a subscriber to a channel, and a channel
/// is just another identity.

use actix_web::{web, HttpResponse};

use crate::error::{AppError, ErrorContext};
use crate::middleware::CurrentUser;
use crate::relationships::EdgeKind;
use crate::routes::{parse_id, ApiResponse};
use crate::startup::AppState;

/// POST /api/v1/subscriptions/c/{channelId}
pub async fn toggle_subscription(
    path: web::Path<String>,
    user: web::ReqData<CurrentUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("toggle_subscription").with_user_id(user.id());
    let channel_id = parse_id("channelId", &path)?;

    let outcome = state
        .relationships
        .toggle(user.id(), channel_id, EdgeKind::Subscription)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    let message = if outcome.active {
        "Subscribed successfully"
    } else {
        "Unsubscribed successfully"
    };
    Ok(ApiResponse::ok(outcome, message))
}

/// GET /api/v1/subscriptions/c/{channelId}
pub async fn channel_subscribers(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let channel_id = parse_id("channelId", &path)?;
    let subscribers = state
        .relationships
        .actors_of(channel_id, EdgeKind::Subscription)
        .await?;
    Ok(ApiResponse::ok(subscribers, "Subscribers fetched successfully"))
}

/// GET /api/v1/subscriptions/u/{subscriberId}
pub async fn subscribed_channels(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let subscriber_id = parse_id("subscriberId", &path)?;
    let channels = state
        .relationships
        .targets_of(subscriber_id, EdgeKind::Subscription)
        .await?;
    Ok(ApiResponse::ok(channels, "Subscribed channels fetched successfully"))
}
