/// Access-token guard
///
/// Takes the access token from the `accessToken` cookie or, failing that,
/// from an `Authorization: Bearer` header, verifies it, re-reads the identity
/// from the store and puts it in request extensions as [`CurrentUser`].

use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage, HttpRequest,
};
use futures::future::LocalBoxFuture;
use uuid::Uuid;

use crate::auth::TokenIssuer;
use crate::error::{AppError, AuthError};
use crate::store::{Identity, IdentityStore, PublicIdentity};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// The authenticated caller, as currently stored
#[derive(Debug, Clone)]
pub struct CurrentUser(Identity);

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.0.id
    }

    pub fn to_public(&self) -> PublicIdentity {
        self.0.to_public()
    }
}

/// Cookie first, then `Authorization: Bearer <token>`
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.cookie(ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| {
            req.headers()
                .get(AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string)
        })
}

/// Verify `token` and load the identity it names
pub async fn authenticate(
    token: &str,
    issuer: &TokenIssuer,
    store: &dyn IdentityStore,
) -> Result<Identity, AppError> {
    let claims = issuer.verify_access_token(token)?;
    let user_id = claims.user_id()?;

    store.find_by_id(user_id).await?.ok_or_else(|| {
        tracing::warn!(user_id = %user_id, "Access token for unknown identity");
        AuthError::UnknownIdentity.into()
    })
}

/// Middleware for routes that require a logged-in caller
#[derive(Clone)]
pub struct AuthGuard {
    issuer: Arc<TokenIssuer>,
    store: Arc<dyn IdentityStore>,
}

impl AuthGuard {
    pub fn new(issuer: Arc<TokenIssuer>, store: Arc<dyn IdentityStore>) -> Self {
        Self { issuer, store }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthGuardService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AuthGuardService {
            service: Rc::new(service),
            issuer: self.issuer.clone(),
            store: self.store.clone(),
        }))
    }
}

pub struct AuthGuardService<S> {
    service: Rc<S>,
    issuer: Arc<TokenIssuer>,
    store: Arc<dyn IdentityStore>,
}

impl<S, B> Service<ServiceRequest> for AuthGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let issuer = self.issuer.clone();
        let store = self.store.clone();

        Box::pin(async move {
            let token = bearer_token(req.request()).ok_or_else(|| {
                tracing::warn!(path = %req.path(), "Missing access token");
                AppError::from(AuthError::MissingToken)
            })?;

            let identity = authenticate(&token, &issuer, store.as_ref()).await?;
            tracing::debug!(user_id = %identity.id, "Access token accepted");

            req.extensions_mut().insert(CurrentUser(identity));
            service.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;

    use crate::configuration::JwtSettings;
    use crate::store::InMemoryStore;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&JwtSettings {
            access_secret: "test-access-secret-at-least-32-characters".to_string(),
            refresh_secret: "test-refresh-secret-at-least-32-characters".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 864_000,
            issuer: "test".to_string(),
        })
    }

    fn identity() -> Identity {
        Identity::new(
            "ana".to_string(),
            "ana@x.io".to_string(),
            "Ana".to_string(),
            "$2b$04$hash".to_string(),
        )
    }

    #[test]
    fn test_cookie_takes_precedence() {
        let req = TestRequest::default()
            .cookie(Cookie::new(ACCESS_TOKEN_COOKIE, "from-cookie"))
            .insert_header((AUTHORIZATION, "Bearer from-header"))
            .to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_header_used_without_cookie() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer from-header"))
            .to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_missing_or_malformed_credentials() {
        let none = TestRequest::default().to_http_request();
        assert!(bearer_token(&none).is_none());

        let basic = TestRequest::default()
            .insert_header((AUTHORIZATION, "Basic dXNlcjpwYXNz"))
            .to_http_request();
        assert!(bearer_token(&basic).is_none());

        let empty = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer "))
            .to_http_request();
        assert!(bearer_token(&empty).is_none());
    }

    #[tokio::test]
    async fn test_authenticate_resolves_stored_identity() {
        let issuer = issuer();
        let store = InMemoryStore::new();
        let stored = store.insert(identity()).await.unwrap();

        let token = issuer.issue_access_token(&stored).unwrap();
        let resolved = authenticate(&token, &issuer, &store).await.unwrap();
        assert_eq!(resolved.id, stored.id);
    }

    #[tokio::test]
    async fn test_authenticate_unknown_identity() {
        let issuer = issuer();
        let store = InMemoryStore::new();

        let token = issuer.issue_access_token(&identity()).unwrap();
        assert!(matches!(
            authenticate(&token, &issuer, &store).await,
            Err(AppError::Auth(AuthError::UnknownIdentity))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_refresh_token() {
        let issuer = issuer();
        let store = InMemoryStore::new();
        let stored = store.insert(identity()).await.unwrap();

        let refresh = issuer.issue_refresh_token(&stored).unwrap();
        assert!(matches!(
            authenticate(&refresh, &issuer, &store).await,
            Err(AppError::Auth(AuthError::TokenInvalid))
        ));
    }
}
