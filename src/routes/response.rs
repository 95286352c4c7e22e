use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, ValidationError};

/// Success envelope shared by every endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code: status.as_u16(),
            data,
            message: message.into(),
            success: status.is_success(),
        }
    }

    pub fn ok(data: T, message: impl Into<String>) -> HttpResponse {
        Self::respond(HttpResponse::Ok(), StatusCode::OK, data, message)
    }

    pub fn created(data: T, message: impl Into<String>) -> HttpResponse {
        Self::respond(HttpResponse::Created(), StatusCode::CREATED, data, message)
    }

    /// Finish a builder that already carries headers or cookies
    pub fn respond(
        mut builder: HttpResponseBuilder,
        status: StatusCode,
        data: T,
        message: impl Into<String>,
    ) -> HttpResponse {
        builder.json(Self::new(status, data, message))
    }
}

/// Path ids are UUIDs; anything else is a 400 rather than a routing miss.
pub fn parse_id(field: &str, raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ValidationError::InvalidFormat(field.to_string()).into())
}
