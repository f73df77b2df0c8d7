//! HTTP mapping for non-WS handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use raven_core::error::RavenError;

/// `RavenError` rendered as a JSON HTTP response.
#[derive(Debug)]
pub struct ApiError(pub RavenError);

impl From<RavenError> for ApiError {
    fn from(e: RavenError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RavenError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RavenError::AuthFailed => StatusCode::UNAUTHORIZED,
            RavenError::NotAllowed(_) => StatusCode::FORBIDDEN,
            RavenError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            RavenError::UnsupportedVersion => StatusCode::BAD_REQUEST,
            RavenError::Rpc(_) => StatusCode::BAD_GATEWAY,
            RavenError::Storage(_) | RavenError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "error": self.0.client_code().as_str(),
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}
