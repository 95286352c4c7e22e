/// Password Hashing and Verification
///
/// bcrypt embeds its random per-call salt in the output, so the hash string
/// is the only thing stored.

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::{AppError, ValidationError};

/// bcrypt only reads the first 72 bytes of its input
const MAX_PASSWORD_BYTES: usize = 72;

/// Hash a password using bcrypt
///
/// # Errors
/// Returns error if:
/// - Password is empty or longer than bcrypt accepts
/// - Bcrypt hashing fails
pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash_password_with_cost(password, DEFAULT_COST)
}

/// Same as [`hash_password`] with an explicit bcrypt work factor (4..=31)
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, AppError> {
    validate_password(password)?;

    hash(password, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
///
/// A stored hash that cannot be parsed counts as a mismatch.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match verify(password, password_hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash could not be verified");
            false
        }
    }
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()).into());
    }

    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::TooLong("password".to_string(), MAX_PASSWORD_BYTES).into());
    }

    Ok(())
}
