/// Refresh Token Session Tracking
///
/// Each identity has at most one accepted refresh token. Only its SHA-256
/// digest is stored; a presented token is valid when its digest equals the
/// stored one, which makes every refresh single-use.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{AppError, AuthError};
use crate::store::IdentityStore;

/// Hash a refresh token using SHA-256
///
/// Never store plaintext tokens.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Make `token` the one accepted refresh token for `identity_id`,
/// replacing whatever session existed before.
pub async fn start_session(
    store: &dyn IdentityStore,
    identity_id: Uuid,
    token: &str,
) -> Result<(), AppError> {
    store
        .set_refresh_token(identity_id, Some(&hash_token(token)))
        .await
}

/// Swap `presented` for `replacement` atomically.
///
/// Fails with `AuthError::TokenStale` if `presented` is no longer the stored
/// token, including when a concurrent rotation won the race.
pub async fn rotate_session(
    store: &dyn IdentityStore,
    identity_id: Uuid,
    presented: &str,
    replacement: &str,
) -> Result<(), AppError> {
    let swapped = store
        .replace_refresh_token(identity_id, &hash_token(presented), &hash_token(replacement))
        .await?;

    if !swapped {
        tracing::warn!(user_id = %identity_id, "Stale refresh token presented");
        return Err(AuthError::TokenStale.into());
    }
    Ok(())
}

/// Forget the stored refresh token. Issued access tokens stay valid until expiry.
pub async fn end_session(store: &dyn IdentityStore, identity_id: Uuid) -> Result<(), AppError> {
    store.set_refresh_token(identity_id, None).await
}

/// Whether `presented` is the token currently stored for the identity
pub fn is_current(stored_hash: Option<&str>, presented: &str) -> bool {
    stored_hash == Some(hash_token(presented).as_str())
}
