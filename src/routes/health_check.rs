use actix_web::HttpResponse;
use serde_json::json;

use crate::routes::ApiResponse;

/// GET /api/v1/healthcheck
pub async fn health_check() -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    ApiResponse::ok(json!({ "status": "OK" }), "Health check passed")
}
