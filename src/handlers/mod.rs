pub mod health;
pub mod ro;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::ServiceError;
use crate::models::RoId;
use crate::ApiResponse;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Order ids arrive as raw path segments; a malformed one is a validation error.
pub fn parse_ro_id(raw: &str) -> Result<RoId, ServiceError> {
    raw.trim().parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn malformed_path_id_is_a_validation_error() {
        assert_eq!(parse_ro_id("RO-2603-0007").unwrap().to_string(), "RO-2603-0007");
        assert_matches!(parse_ro_id("7"), Err(ServiceError::ValidationError(_)));
    }
}
