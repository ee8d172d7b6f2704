use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::auth::AuthError;

/// Failure of a control trigger, rendered as `{success: false, error}`.
#[derive(Debug)]
pub struct ApiError(pub AuthError);

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        Self(error)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            AuthError::NoActiveFlow => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// OAuth rejections keep the server's own `error`/`error_description` pair.
    fn body(&self) -> Value {
        match &self.0 {
            AuthError::Server {
                error, description, ..
            } => json!({
                "error": error,
                "error_description": description,
            }),
            other => Value::String(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "control request failed");
        } else {
            tracing::debug!(error = %self.0, "control request rejected");
        }
        (status, Json(json!({ "success": false, "error": self.body() }))).into_response()
    }
}
