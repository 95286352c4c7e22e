/// JWT Claims structures
///
/// Access claims carry a denormalised copy of the profile so handlers can
/// read it without a store round-trip. Refresh claims carry only the subject
/// and a random `jti`, so two refresh tokens are never byte-identical.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AuthError};
use crate::store::Identity;

/// Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// Subject (identity ID as UUID string)
    pub sub: String,
    pub email: String,
    pub username: String,
    pub full_name: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
}

/// Claims for refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub sub: String,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

impl AccessClaims {
    pub fn new(identity: &Identity, expiry_seconds: i64, issuer: &str) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: identity.id.to_string(),
            email: identity.email.clone(),
            username: identity.username.clone(),
            full_name: identity.full_name.clone(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer.to_string(),
        }
    }

    /// Extract identity ID from claims
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        parse_subject(&self.sub)
    }
}

impl RefreshClaims {
    pub fn new(identity_id: Uuid, expiry_seconds: i64, issuer: &str) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: identity_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer.to_string(),
        }
    }

    pub fn user_id(&self) -> Result<Uuid, AppError> {
        parse_subject(&self.sub)
    }
}

// A signed token with a non-UUID subject is still just an invalid token.
fn parse_subject(sub: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(sub).map_err(|_| AuthError::TokenInvalid.into())
}
