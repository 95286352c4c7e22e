/// Input validators for identity fields
///
/// Usernames and emails are normalised (trimmed, lowercased) before they are
/// checked, so uniqueness in the store is case-insensitive.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_EMAIL_LOCAL_PART_LENGTH: usize = 64;
const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 30;
const MAX_NAME_LENGTH: usize = 256;
const MAX_URL_LENGTH: usize = 2048;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)*$"
    ).unwrap();

    static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-z0-9_.]+$").unwrap();

    static ref MEDIA_URL_REGEX: Regex = Regex::new(r"^https?://[^\s/?#]+[^\s]*$").unwrap();
}

/// Validates and normalises an email address
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let normalised = email.trim().to_lowercase();

    if normalised.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if normalised.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if normalised.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(&normalised) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    if normalised.split('@').next().map_or(0, str::len) > MAX_EMAIL_LOCAL_PART_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LOCAL_PART_LENGTH));
    }

    Ok(normalised)
}

/// Validates and normalises a username (channel handle)
pub fn is_valid_username(username: &str) -> Result<String, ValidationError> {
    let normalised = username.trim().to_lowercase();

    if normalised.is_empty() {
        return Err(ValidationError::EmptyField("username".to_string()));
    }

    if normalised.chars().count() < MIN_USERNAME_LENGTH {
        return Err(ValidationError::TooShort("username".to_string(), MIN_USERNAME_LENGTH));
    }

    if normalised.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong("username".to_string(), MAX_USERNAME_LENGTH));
    }

    if !USERNAME_REGEX.is_match(&normalised) {
        return Err(ValidationError::InvalidFormat("username".to_string()));
    }

    Ok(normalised)
}

/// Validates a display name
pub fn is_valid_full_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("fullName".to_string()));
    }

    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong("fullName".to_string(), MAX_NAME_LENGTH));
    }

    if trimmed.chars().any(char::is_control) {
        return Err(ValidationError::SuspiciousContent("fullName".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Validates a hosted media URL (avatar, cover image); `field` names it in errors
pub fn is_valid_media_url(field: &str, url: Option<&str>) -> Result<String, ValidationError> {
    let trimmed = url.map(str::trim).unwrap_or_default();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }

    if trimmed.len() > MAX_URL_LENGTH {
        return Err(ValidationError::TooLong(field.to_string(), MAX_URL_LENGTH));
    }

    if !MEDIA_URL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat(field.to_string()));
    }

    Ok(trimmed.to_string())
}
