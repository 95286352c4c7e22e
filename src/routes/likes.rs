/// Like Routes
///
/// Each call flips the caller's like on a video, comment or tweet.

use actix_web::{web, HttpResponse};

use crate::error::{AppError, ErrorContext};
use crate::middleware::CurrentUser;
use crate::relationships::EdgeKind;
use crate::routes::{parse_id, ApiResponse};
use crate::startup::AppState;

async fn toggle_like(
    kind: EdgeKind,
    field: &str,
    raw_id: &str,
    user: &CurrentUser,
    state: &AppState,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("toggle_like").with_user_id(user.id());
    let target_id = parse_id(field, raw_id)?;

    let outcome = state
        .relationships
        .toggle(user.id(), target_id, kind)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    let message = if outcome.active { "Liked" } else { "Like removed" };
    Ok(ApiResponse::ok(outcome, message))
}

/// POST /api/v1/likes/toggle/v/{videoId}
pub async fn toggle_video_like(
    path: web::Path<String>,
    user: web::ReqData<CurrentUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    toggle_like(EdgeKind::VideoLike, "videoId", &path, &user, &state).await
}

/// POST /api/v1/likes/toggle/c/{commentId}
pub async fn toggle_comment_like(
    path: web::Path<String>,
    user: web::ReqData<CurrentUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    toggle_like(EdgeKind::CommentLike, "commentId", &path, &user, &state).await
}

/// POST /api/v1/likes/toggle/t/{tweetId}
pub async fn toggle_tweet_like(
    path: web::Path<String>,
    user: web::ReqData<CurrentUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    toggle_like(EdgeKind::TweetLike, "tweetId", &path, &user, &state).await
}

/// GET /api/v1/likes/videos
pub async fn liked_videos(
    user: web::ReqData<CurrentUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let videos = state
        .relationships
        .targets_of(user.id(), EdgeKind::VideoLike)
        .await?;
    Ok(ApiResponse::ok(videos, "Liked videos fetched successfully"))
}
