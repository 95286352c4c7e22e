/// User Routes
///
/// Registration, login, refresh-token rotation, logout and account
/// maintenance. Login and refresh hand the token pair out both as
/// `HttpOnly` cookies and in the response body.

use actix_web::cookie::{time::Duration, Cookie, SameSite};
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{Registration, Session};
use crate::error::{AppError, AuthError, ErrorContext};
use crate::middleware::{CurrentUser, ACCESS_TOKEN_COOKIE};
use crate::routes::ApiResponse;
use crate::startup::AppState;
use crate::store::{ProfileImage, PublicIdentity};

pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
}

/// Either `username` or `email` identifies the account
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    pub full_name: String,
    pub email: String,
}

/// Media is uploaded elsewhere; these carry the resulting URL
#[derive(Deserialize)]
pub struct AvatarRequest {
    pub avatar: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverImageRequest {
    pub cover_image: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: PublicIdentity,
    pub access_token: String,
    pub refresh_token: String,
}

fn auth_cookie(name: &'static str, value: String, max_age_seconds: i64, secure: bool) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(Duration::seconds(max_age_seconds))
        .finish()
}

fn removal_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    let mut cookie = auth_cookie(name, String::new(), 0, secure);
    cookie.make_removal();
    cookie
}

/// 200 with both cookies set and the pair echoed in the body
fn session_response(state: &AppState, session: Session, message: &str) -> HttpResponse {
    let issuer = state.auth.issuer();
    let mut builder = HttpResponse::Ok();
    builder
        .cookie(auth_cookie(
            ACCESS_TOKEN_COOKIE,
            session.tokens.access_token.clone(),
            issuer.access_token_expiry(),
            state.secure_cookies,
        ))
        .cookie(auth_cookie(
            REFRESH_TOKEN_COOKIE,
            session.tokens.refresh_token.clone(),
            issuer.refresh_token_expiry(),
            state.secure_cookies,
        ));

    ApiResponse::respond(
        builder,
        StatusCode::OK,
        SessionResponse {
            user: session.user,
            access_token: session.tokens.access_token,
            refresh_token: session.tokens.refresh_token,
        },
        message,
    )
}

/// POST /api/v1/users/register
///
/// # Errors
/// - 400: invalid username, email, full name or empty password
/// - 409: username or email already taken
pub async fn register(
    form: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");
    let form = form.into_inner();

    let user = state
        .auth
        .register(Registration {
            username: form.username,
            email: form.email,
            full_name: form.full_name,
            password: form.password,
            avatar: form.avatar,
            cover_image: form.cover_image,
        })
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User registered successfully"
    );

    Ok(ApiResponse::created(user, "User registered successfully"))
}

/// POST /api/v1/users/login
///
/// Unknown account and wrong password both answer 401 with the same body.
pub async fn login(
    form: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let session = state
        .auth
        .login(form.username.as_deref(), form.email.as_deref(), &form.password)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %session.user.id,
        "User logged in successfully"
    );

    Ok(session_response(&state, session, "User logged in successfully"))
}

/// POST /api/v1/users/refresh-token
///
/// The refresh token comes from the `refreshToken` cookie or, failing that,
/// the JSON body. A token that was already rotated is rejected.
pub async fn refresh_token(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let presented = req
        .cookie(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| body.and_then(|b| b.into_inner().refresh_token))
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::MissingToken)?;

    let session = state.auth.refresh(&presented).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %session.user.id,
        "Access token refreshed"
    );

    Ok(session_response(&state, session, "Access token refreshed"))
}

/// POST /api/v1/users/logout
pub async fn logout(
    user: web::ReqData<CurrentUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.auth.logout(user.id()).await?;

    let mut builder = HttpResponse::Ok();
    builder
        .cookie(removal_cookie(ACCESS_TOKEN_COOKIE, state.secure_cookies))
        .cookie(removal_cookie(REFRESH_TOKEN_COOKIE, state.secure_cookies));

    Ok(ApiResponse::respond(
        builder,
        StatusCode::OK,
        json!({}),
        "User logged out",
    ))
}

/// POST /api/v1/users/change-password
///
/// A wrong old password is 401. Success ends the refresh session.
pub async fn change_password(
    form: web::Json<ChangePasswordRequest>,
    user: web::ReqData<CurrentUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("change_password").with_user_id(user.id());

    state
        .auth
        .change_password(user.id(), &form.old_password, &form.new_password)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    Ok(ApiResponse::ok(json!({}), "Password changed successfully"))
}

/// GET /api/v1/users/current-user
pub async fn current_user(user: web::ReqData<CurrentUser>) -> HttpResponse {
    ApiResponse::ok(user.to_public(), "Current user fetched successfully")
}

/// PATCH /api/v1/users/update-account
pub async fn update_account(
    form: web::Json<UpdateAccountRequest>,
    user: web::ReqData<CurrentUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("update_account").with_user_id(user.id());

    let updated = state
        .auth
        .update_account(user.id(), &form.full_name, &form.email)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    Ok(ApiResponse::ok(updated, "Account details updated successfully"))
}

async fn update_image(
    image: ProfileImage,
    url: Option<&str>,
    user: &CurrentUser,
    state: &AppState,
) -> Result<PublicIdentity, AppError> {
    let context = ErrorContext::new("update_profile_image").with_user_id(user.id());

    state
        .auth
        .update_image(user.id(), image, url)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })
}

/// PATCH /api/v1/users/avatar
pub async fn update_avatar(
    form: web::Json<AvatarRequest>,
    user: web::ReqData<CurrentUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let updated = update_image(ProfileImage::Avatar, form.avatar.as_deref(), &user, &state).await?;
    Ok(ApiResponse::ok(updated, "Avatar image updated successfully"))
}

/// PATCH /api/v1/users/cover-image
pub async fn update_cover_image(
    form: web::Json<CoverImageRequest>,
    user: web::ReqData<CurrentUser>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let updated = update_image(
        ProfileImage::CoverImage,
        form.cover_image.as_deref(),
        &user,
        &state,
    )
    .await?;
    Ok(ApiResponse::ok(updated, "Cover image updated successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_cookie_attributes() {
        let cookie = auth_cookie(ACCESS_TOKEN_COOKIE, "token".to_string(), 900, true);
        assert_eq!(cookie.name(), "accessToken");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(900)));
    }

    #[test]
    fn test_removal_cookie_is_empty_and_expired() {
        let cookie = removal_cookie(REFRESH_TOKEN_COOKIE, false);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }
}
