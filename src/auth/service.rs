/// Authentication service
///
/// Registration, login, refresh-token rotation, logout and credential
/// changes. Handlers stay thin and call into this.

use std::sync::Arc;

use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::auth::jwt::{TokenIssuer, TokenPair};
use crate::auth::password::{hash_password_with_cost, verify_password};
use crate::auth::session;
use crate::error::{AppError, AuthError, ValidationError};
use crate::store::{AccountUpdate, Identity, IdentityStore, ProfileImage, PublicIdentity};
use crate::validators::{
    is_valid_email, is_valid_full_name, is_valid_media_url, is_valid_username,
};

/// Validated input for a new account
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
}

/// A successful login or refresh
#[derive(Debug, Clone)]
pub struct Session {
    pub user: PublicIdentity,
    pub tokens: TokenPair,
}

/// Checked against when a login names no account, so that path pays for a
/// bcrypt verify just like a wrong password does
const DUMMY_PASSWORD: &str = "vidtube-no-such-account";

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn IdentityStore>,
    issuer: Arc<TokenIssuer>,
    bcrypt_cost: u32,
    /// `DUMMY_PASSWORD` hashed at `bcrypt_cost`, on first use
    dummy_hash: Arc<OnceCell<String>>,
}

impl AuthService {
    pub fn new(store: Arc<dyn IdentityStore>, issuer: Arc<TokenIssuer>) -> Self {
        Self {
            store,
            issuer,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self.dummy_hash = Arc::new(OnceCell::new());
        self
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    #[tracing::instrument(name = "register_user", skip_all)]
    pub async fn register(&self, registration: Registration) -> Result<PublicIdentity, AppError> {
        let username = is_valid_username(&registration.username)?;
        let email = is_valid_email(&registration.email)?;
        let full_name = is_valid_full_name(&registration.full_name)?;
        let password_hash = hash_blocking(registration.password, self.bcrypt_cost).await?;

        let mut identity = Identity::new(username, email, full_name, password_hash);
        identity.avatar = registration.avatar;
        identity.cover_image = registration.cover_image;

        let created = self.store.insert(identity).await?;
        tracing::info!(user_id = %created.id, "User registered");
        Ok(created.to_public())
    }

    /// Authenticate by username or email. Unknown account and wrong password
    /// fail identically.
    #[tracing::instrument(name = "login_user", skip_all)]
    pub async fn login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        password: &str,
    ) -> Result<Session, AppError> {
        let username = username.map(|u| u.trim().to_lowercase()).filter(|u| !u.is_empty());
        let email = email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty());
        if username.is_none() && email.is_none() {
            return Err(ValidationError::EmptyField("username or email".to_string()).into());
        }

        let identity = match self
            .store
            .find_by_login(username.as_deref(), email.as_deref())
            .await?
        {
            Some(identity) => identity,
            None => {
                let dummy = self.dummy_password_hash().await?;
                verify_blocking(password.to_string(), dummy).await?;
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !verify_blocking(password.to_string(), identity.password_hash.clone()).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        let tokens = self.issuer.issue_pair(&identity)?;
        session::start_session(self.store.as_ref(), identity.id, &tokens.refresh_token).await?;

        tracing::info!(user_id = %identity.id, "User logged in");
        Ok(Session {
            user: identity.to_public(),
            tokens,
        })
    }

    /// Exchange a refresh token for a new pair. The presented token stops
    /// working the moment this succeeds.
    #[tracing::instrument(name = "refresh_session", skip_all)]
    pub async fn refresh(&self, presented: &str) -> Result<Session, AppError> {
        let identity_id = self.issuer.verify_refresh_token(presented)?;

        let identity = self
            .store
            .find_by_id(identity_id)
            .await?
            .ok_or(AuthError::UnknownIdentity)?;

        if !session::is_current(identity.refresh_token_hash.as_deref(), presented) {
            tracing::warn!(user_id = %identity_id, "Refresh token already rotated or revoked");
            return Err(AuthError::TokenStale.into());
        }

        let tokens = self.issuer.issue_pair(&identity)?;
        session::rotate_session(
            self.store.as_ref(),
            identity_id,
            presented,
            &tokens.refresh_token,
        )
        .await?;

        tracing::info!(user_id = %identity_id, "Session refreshed");
        Ok(Session {
            user: identity.to_public(),
            tokens,
        })
    }

    #[tracing::instrument(name = "logout_user", skip(self))]
    pub async fn logout(&self, identity_id: Uuid) -> Result<(), AppError> {
        session::end_session(self.store.as_ref(), identity_id).await?;
        tracing::info!(user_id = %identity_id, "User logged out");
        Ok(())
    }

    /// Requires the current password. Ends the refresh session so other
    /// devices must log in again.
    #[tracing::instrument(name = "change_password", skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        identity_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let identity = self
            .store
            .find_by_id(identity_id)
            .await?
            .ok_or(AuthError::UnknownIdentity)?;

        if !verify_blocking(old_password.to_string(), identity.password_hash).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        let password_hash = hash_blocking(new_password.to_string(), self.bcrypt_cost).await?;
        self.store.update_password(identity_id, &password_hash).await?;

        tracing::info!(user_id = %identity_id, "Password changed");
        Ok(())
    }

    #[tracing::instrument(name = "update_account", skip(self, full_name, email))]
    pub async fn update_account(
        &self,
        identity_id: Uuid,
        full_name: &str,
        email: &str,
    ) -> Result<PublicIdentity, AppError> {
        let update = AccountUpdate {
            full_name: is_valid_full_name(full_name)?,
            email: is_valid_email(email)?,
        };

        let updated = self.store.update_account(identity_id, update).await?;
        Ok(updated.to_public())
    }

    /// Replace the avatar or cover image with an already-hosted URL
    #[tracing::instrument(name = "update_profile_image", skip(self, url))]
    pub async fn update_image(
        &self,
        identity_id: Uuid,
        image: ProfileImage,
        url: Option<&str>,
    ) -> Result<PublicIdentity, AppError> {
        let url = is_valid_media_url(image.field(), url)?;
        let updated = self.store.update_image(identity_id, image, &url).await?;

        tracing::info!(user_id = %identity_id, field = image.field(), "Profile image updated");
        Ok(updated.to_public())
    }

    async fn dummy_password_hash(&self) -> Result<String, AppError> {
        let cost = self.bcrypt_cost;
        self.dummy_hash
            .get_or_try_init(|| hash_blocking(DUMMY_PASSWORD.to_string(), cost))
            .await
            .cloned()
    }
}

async fn hash_blocking(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password_with_cost(&password, cost)).await?
}

async fn verify_blocking(password: String, password_hash: String) -> Result<bool, AppError> {
    Ok(tokio::task::spawn_blocking(move || verify_password(&password, &password_hash)).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::JwtSettings;
    use crate::error::DatabaseError;
    use crate::store::InMemoryStore;

    fn service() -> AuthService {
        let settings = JwtSettings {
            access_secret: "test-access-secret-at-least-32-characters".to_string(),
            refresh_secret: "test-refresh-secret-at-least-32-characters".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 864_000,
            issuer: "test".to_string(),
        };
        AuthService::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(TokenIssuer::new(&settings)),
        )
        .with_bcrypt_cost(4)
    }

    fn ana() -> Registration {
        Registration {
            username: "ana".to_string(),
            email: "ana@x.io".to_string(),
            full_name: "Ana".to_string(),
            password: "p1".to_string(),
            avatar: Some("https://cdn.example/ana.png".to_string()),
            cover_image: None,
        }
    }

    #[tokio::test]
    async fn test_register_returns_sanitised_identity() {
        let auth = service();
        let user = auth.register(ana()).await.unwrap();

        assert_eq!(user.username, "ana");
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("refreshTokenHash").is_none());
    }

    #[tokio::test]
    async fn test_register_is_case_insensitive_unique() {
        let auth = service();
        auth.register(ana()).await.unwrap();

        let mut shouting = ana();
        shouting.username = "ANA".to_string();
        shouting.email = "other@x.io".to_string();
        let err = auth.register(shouting).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Database(DatabaseError::UniqueConstraintViolation(ref f)) if f == "username"
        ));
    }

    #[tokio::test]
    async fn test_login_by_username_or_email() {
        let auth = service();
        auth.register(ana()).await.unwrap();

        assert!(auth.login(Some("ana"), None, "p1").await.is_ok());
        assert!(auth.login(None, Some("ANA@x.io"), "p1").await.is_ok());
        assert!(matches!(
            auth.login(None, None, "p1").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let auth = service();
        auth.register(ana()).await.unwrap();

        let wrong_password = auth.login(Some("ana"), None, "nope").await.unwrap_err();
        let unknown_user = auth.login(Some("ghost"), None, "p1").await.unwrap_err();

        assert!(matches!(wrong_password, AppError::Auth(AuthError::InvalidCredentials)));
        assert!(matches!(unknown_user, AppError::Auth(AuthError::InvalidCredentials)));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn test_unknown_account_still_runs_bcrypt() {
        let auth = service();
        assert!(!auth.dummy_hash.initialized());

        let err = auth.login(Some("ghost"), None, "p1").await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::InvalidCredentials)));

        let dummy = auth.dummy_hash.get().expect("dummy hash computed on miss");
        assert!(dummy.starts_with("$2b$04$"));
    }

    #[tokio::test]
    async fn test_refresh_rotation_single_use() {
        let auth = service();
        auth.register(ana()).await.unwrap();
        let t0 = auth.login(Some("ana"), None, "p1").await.unwrap().tokens;

        let t1 = auth.refresh(&t0.refresh_token).await.unwrap().tokens;
        assert_ne!(t0.refresh_token, t1.refresh_token);

        assert!(matches!(
            auth.refresh(&t0.refresh_token).await,
            Err(AppError::Auth(AuthError::TokenStale))
        ));
        assert!(auth.refresh(&t1.refresh_token).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refresh_only_one_wins() {
        let auth = service();
        auth.register(ana()).await.unwrap();
        let t0 = auth.login(Some("ana"), None, "p1").await.unwrap().tokens;

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let auth = auth.clone();
                let token = t0.refresh_token.clone();
                tokio::spawn(async move { auth.refresh(&token).await })
            })
            .collect();

        let winners = futures::future::join_all(attempts)
            .await
            .into_iter()
            .filter(|result| matches!(result, Ok(Ok(_))))
            .count();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_access_token_is_not_a_refresh_token() {
        let auth = service();
        auth.register(ana()).await.unwrap();
        let tokens = auth.login(Some("ana"), None, "p1").await.unwrap().tokens;

        assert!(matches!(
            auth.refresh(&tokens.access_token).await,
            Err(AppError::Auth(AuthError::TokenInvalid))
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes_refresh_token() {
        let auth = service();
        let user = auth.register(ana()).await.unwrap();
        let tokens = auth.login(Some("ana"), None, "p1").await.unwrap().tokens;

        auth.logout(user.id).await.unwrap();
        assert!(auth.refresh(&tokens.refresh_token).await.is_err());
        // access tokens live until they expire
        assert!(auth.issuer().verify_access_token(&tokens.access_token).is_ok());
    }

    #[tokio::test]
    async fn test_change_password() {
        let auth = service();
        let user = auth.register(ana()).await.unwrap();
        let tokens = auth.login(Some("ana"), None, "p1").await.unwrap().tokens;

        assert!(matches!(
            auth.change_password(user.id, "wrong", "p2").await,
            Err(AppError::Auth(AuthError::InvalidCredentials))
        ));
        auth.change_password(user.id, "p1", "p2").await.unwrap();

        assert!(auth.refresh(&tokens.refresh_token).await.is_err());
        assert!(auth.login(Some("ana"), None, "p1").await.is_err());
        assert!(auth.login(Some("ana"), None, "p2").await.is_ok());
    }

    #[tokio::test]
    async fn test_update_images() {
        let auth = service();
        let user = auth.register(ana()).await.unwrap();

        let updated = auth
            .update_image(user.id, ProfileImage::CoverImage, Some("https://cdn.example/cover.png"))
            .await
            .unwrap();
        assert_eq!(updated.cover_image.as_deref(), Some("https://cdn.example/cover.png"));
        assert_eq!(updated.avatar.as_deref(), Some("https://cdn.example/ana.png"));

        let updated = auth
            .update_image(user.id, ProfileImage::Avatar, Some("https://cdn.example/new.png"))
            .await
            .unwrap();
        assert_eq!(updated.avatar.as_deref(), Some("https://cdn.example/new.png"));

        assert!(matches!(
            auth.update_image(user.id, ProfileImage::Avatar, None).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_account() {
        let auth = service();
        let user = auth.register(ana()).await.unwrap();

        let updated = auth.update_account(user.id, "Ana Maria", "Ana.M@x.io").await.unwrap();
        assert_eq!(updated.full_name, "Ana Maria");
        assert_eq!(updated.email, "ana.m@x.io");
        assert!(auth.login(None, Some("ana.m@x.io"), "p1").await.is_ok());
    }
}
