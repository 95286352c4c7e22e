/// JWT Token Generation and Validation
///
/// Access and refresh tokens are HS256 JWTs signed with separate secrets.
/// Verification checks signature, issuer and expiry and nothing else; it
/// never touches the store.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::claims::{AccessClaims, RefreshClaims};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::store::Identity;

/// A freshly minted access + refresh pair
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
}

impl TokenIssuer {
    pub fn new(config: &JwtSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;

        Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            access_token_expiry: config.access_token_expiry,
            refresh_token_expiry: config.refresh_token_expiry,
        }
    }

    /// Access token lifetime in seconds
    pub fn access_token_expiry(&self) -> i64 {
        self.access_token_expiry
    }

    pub fn refresh_token_expiry(&self) -> i64 {
        self.refresh_token_expiry
    }

    pub fn issue_access_token(&self, identity: &Identity) -> Result<String, AppError> {
        let claims = AccessClaims::new(identity, self.access_token_expiry, &self.issuer);
        self.sign(&claims, &self.access_encoding)
    }

    pub fn issue_refresh_token(&self, identity: &Identity) -> Result<String, AppError> {
        let claims = RefreshClaims::new(identity.id, self.refresh_token_expiry, &self.issuer);
        self.sign(&claims, &self.refresh_encoding)
    }

    pub fn issue_pair(&self, identity: &Identity) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(identity)?,
            refresh_token: self.issue_refresh_token(identity)?,
        })
    }

    /// Validate an access token and return its claims
    ///
    /// # Errors
    /// `AuthError::TokenInvalid` for any failure, expired or forged alike.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AppError> {
        decode::<AccessClaims>(token, &self.access_decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Access token rejected");
                AuthError::TokenInvalid.into()
            })
    }

    /// Validate a refresh token and return the identity it was issued to
    pub fn verify_refresh_token(&self, token: &str) -> Result<Uuid, AppError> {
        decode::<RefreshClaims>(token, &self.refresh_decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Refresh token rejected");
                AppError::from(AuthError::TokenInvalid)
            })?
            .claims
            .user_id()
    }

    fn sign<T: Serialize>(&self, claims: &T, key: &EncodingKey) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            access_secret: "test-access-secret-at-least-32-characters".to_string(),
            refresh_secret: "test-refresh-secret-at-least-32-characters".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
        }
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
    fn test_access_token_round_trip() {
        let issuer = TokenIssuer::new(&get_test_config());
        let identity = identity();

        let token = issuer.issue_access_token(&identity).expect("Failed to generate token");
        let claims = issuer.verify_access_token(&token).expect("Failed to validate token");

        assert_eq!(claims.user_id().unwrap(), identity.id);
        assert_eq!(claims.username, "ana");
        assert_eq!(claims.iss, "test");
    }

    #[test]
    fn test_refresh_token_round_trip() {
        let issuer = TokenIssuer::new(&get_test_config());
        let identity = identity();

        let token = issuer.issue_refresh_token(&identity).unwrap();
        assert_eq!(issuer.verify_refresh_token(&token).unwrap(), identity.id);
    }

    #[test]
    fn test_refresh_tokens_differ_within_same_second() {
        let issuer = TokenIssuer::new(&get_test_config());
        let identity = identity();
        assert_ne!(
            issuer.issue_refresh_token(&identity).unwrap(),
            issuer.issue_refresh_token(&identity).unwrap()
        );
    }

    #[test]
    fn test_expired_access_token() {
        let config = get_test_config();
        let issuer = TokenIssuer::new(&config);
        let claims = AccessClaims::new(&identity(), -10, &config.issuer);
        let token = issuer.sign(&claims, &issuer.access_encoding).unwrap();

        assert!(matches!(
            issuer.verify_access_token(&token),
            Err(AppError::Auth(AuthError::TokenInvalid))
        ));
    }

    #[test]
    fn test_expired_refresh_token() {
        let config = get_test_config();
        let issuer = TokenIssuer::new(&config);
        let claims = RefreshClaims::new(Uuid::new_v4(), -10, &config.issuer);
        let token = issuer.sign(&claims, &issuer.refresh_encoding).unwrap();

        assert!(issuer.verify_refresh_token(&token).is_err());
    }

    #[test]
    fn test_keys_are_not_interchangeable() {
        let issuer = TokenIssuer::new(&get_test_config());
        let identity = identity();

        let access = issuer.issue_access_token(&identity).unwrap();
        let refresh = issuer.issue_refresh_token(&identity).unwrap();

        assert!(issuer.verify_refresh_token(&access).is_err());
        assert!(issuer.verify_access_token(&refresh).is_err());
    }

    #[test]
    fn test_invalid_token() {
        let issuer = TokenIssuer::new(&get_test_config());
        assert!(issuer.verify_access_token("invalid.token.here").is_err());
        assert!(issuer.verify_access_token("").is_err());
    }

    #[test]
    fn test_tampered_token() {
        let issuer = TokenIssuer::new(&get_test_config());
        let token = issuer.issue_access_token(&identity()).unwrap();

        let tampered = format!("{}X", token);
        assert!(issuer.verify_access_token(&tampered).is_err());
    }

    #[test]
    fn test_wrong_issuer() {
        let mut config = get_test_config();
        let token = TokenIssuer::new(&config).issue_access_token(&identity()).unwrap();

        config.issuer = "wrong-issuer".to_string();
        assert!(TokenIssuer::new(&config).verify_access_token(&token).is_err());
    }

    #[test]
    fn test_other_secret_rejected() {
        let config = get_test_config();
        let token = TokenIssuer::new(&config).issue_access_token(&identity()).unwrap();

        let mut other = config.clone();
        other.access_secret = "a-completely-different-access-secret-value".to_string();
        assert!(TokenIssuer::new(&other).verify_access_token(&token).is_err());
    }
}
