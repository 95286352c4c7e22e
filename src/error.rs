/// Error Handling Module
///
/// Every operation of the service returns one of the domain error kinds
/// below, wrapped in `AppError`. The HTTP layer decides status codes and
/// logs each failure with the same `error_id` it sends to the client.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

// ============================================================================
// 1. DOMAIN-SPECIFIC ERROR TYPES
// ============================================================================

/// Validation errors for input data
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    EmptyField(String),
    #[error("{0} is too short (minimum {1} characters)")]
    TooShort(String, usize),
    #[error("{0} is too long (maximum {1} characters)")]
    TooLong(String, usize),
    #[error("{0} has invalid format")]
    InvalidFormat(String),
    #[error("{0} contains suspicious content")]
    SuspiciousContent(String),
}

/// Storage operation errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A unique constraint rejected the write; carries the field name.
    #[error("{0} already exists")]
    UniqueConstraintViolation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("query error: {0}")]
    QueryExecution(String),
    #[error("database connection error: {0}")]
    ConnectionPool(String),
    #[error("database error: {0}")]
    UnexpectedError(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required config: {0}")]
    MissingRequired(String),
    #[error("invalid config value: {0}")]
    InvalidValue(String),
    #[error("config parse error: {0}")]
    ParseError(String),
}

/// Authentication and authorization errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username/email or wrong password. Never says which.
    #[error("invalid user credentials")]
    InvalidCredentials,
    #[error("missing authentication token")]
    MissingToken,
    /// Bad signature, wrong key, malformed or expired.
    #[error("invalid or expired token")]
    TokenInvalid,
    /// Well-formed refresh token that is no longer the stored one.
    #[error("refresh token is expired or used")]
    TokenStale,
    /// Token verified but its subject no longer resolves to an identity.
    #[error("invalid access token")]
    UnknownIdentity,
}

// ============================================================================
// 2. UNIFIED APPLICATION ERROR TYPE
// ============================================================================

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::Database(DatabaseError::NotFound(what.into()))
    }

    pub fn conflict(field: impl Into<String>) -> Self {
        AppError::Database(DatabaseError::UniqueConstraintViolation(field.into()))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::not_found("record"),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::Database(DatabaseError::ConnectionPool(err.to_string()))
            }
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                AppError::conflict(unique_field(db_err.constraint()))
            }
            sqlx::Error::Database(db_err) => {
                AppError::Database(DatabaseError::QueryExecution(db_err.message().to_string()))
            }
            _ => AppError::Database(DatabaseError::UnexpectedError(err.to_string())),
        }
    }
}

/// Maps a unique index name from `migrations/` to the user-facing field.
fn unique_field(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some(name) if name.contains("username") => "username",
        Some(name) if name.contains("email") => "email",
        Some(name) if name.contains("edge") => "relationship",
        _ => "record",
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("blocking task failed: {}", err))
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID, also present in the server log line
    pub error_id: String,
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl AppError {
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),

            AppError::Database(e) => match e {
                DatabaseError::UniqueConstraintViolation(_) => {
                    (StatusCode::CONFLICT, "DUPLICATE_ENTRY", e.to_string())
                }
                DatabaseError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),
                DatabaseError::ConnectionPool(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service temporarily unavailable".to_string(),
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error occurred".to_string(),
                ),
            },

            AppError::Auth(e) => {
                let code = match e {
                    AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
                    AuthError::MissingToken => "MISSING_TOKEN",
                    AuthError::TokenInvalid | AuthError::UnknownIdentity => "TOKEN_INVALID",
                    AuthError::TokenStale => "TOKEN_STALE",
                };
                (StatusCode::UNAUTHORIZED, code, e.to_string())
            }

            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                "Server configuration error".to_string(),
            ),

            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        }
    }
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = self.classify();
        let body = ErrorResponse::new(
            request_id.to_string(),
            message,
            code.to_string(),
            status.as_u16(),
        );
        (status, body)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Database(DatabaseError::UniqueConstraintViolation(field)) => {
                tracing::warn!(request_id = request_id, field = %field, "Duplicate entry attempt");
            }
            AppError::Database(DatabaseError::NotFound(what)) => {
                tracing::info!(request_id = request_id, what = %what, "Resource not found");
            }
            AppError::Database(e) => {
                tracing::error!(request_id = request_id, error = %e, "Database error");
            }
            AppError::Auth(AuthError::InvalidCredentials) => {
                tracing::warn!(request_id = request_id, "Invalid credentials attempt");
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication error");
            }
            AppError::Config(e) => {
                tracing::error!(request_id = request_id, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, body) = <Self as ErrorHandler>::error_response(self, &request_id);
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        self.classify().0
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Per-operation context carried into log lines
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_user_id(mut self, user_id: impl ToString) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn log_error(&self, error: &AppError) {
        match error {
            AppError::Validation(_) | AppError::Auth(_) => {
                tracing::warn!(
                    request_id = %self.request_id,
                    operation = %self.operation,
                    user_id = ?self.user_id,
                    error = %error,
                    "Operation rejected"
                );
            }
            _ => {
                tracing::error!(
                    request_id = %self.request_id,
                    operation = %self.operation,
                    user_id = ?self.user_id,
                    error = %error,
                    "Operation failed"
                );
            }
        }
    }
}
