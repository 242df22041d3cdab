// --- File: crates/bookwell_common/src/http.rs ---
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::error::{BookwellError, HttpStatusCode};

/// Extension trait for BookwellError to convert it to an Axum HTTP response.
pub trait IntoHttpResponse {
    /// Converts the error into an Axum HTTP response.
    fn into_http_response(self) -> Response;
}

impl IntoHttpResponse for BookwellError {
    fn into_http_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            error!("Request failed: {}", self);
        }

        let mut body = json!({
            "error": self.user_message(),
            "kind": self.kind(),
            "retryable": self.is_retryable(),
        });
        if let BookwellError::PolicyError(violation) = &self {
            body["policy"] = json!(violation);
        }

        (status_code, Json(body)).into_response()
    }
}

/// Implement IntoResponse for BookwellError to make it easier to use in Axum handlers.
impl IntoResponse for BookwellError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}

