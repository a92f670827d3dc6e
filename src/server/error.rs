//! HTTP error mapping for session errors.
//!
//! Errors reach consumers as structured JSON, never as raw debug text; the
//! session stays usable for subsequent requests unless the process itself
//! has exited.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::SimError;

/// Wrapper giving [`SimError`] an HTTP shape.
#[derive(Debug)]
pub struct ApiError(pub SimError);

impl From<SimError> for ApiError {
    fn from(err: SimError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    /// Map error variant to an HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self.0 {
            SimError::NotRunning => StatusCode::CONFLICT,
            SimError::EscapePending => StatusCode::CONFLICT,
            SimError::StartupTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            SimError::QuitTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            SimError::ProcessExited => StatusCode::BAD_GATEWAY,
            SimError::Parse(_) => StatusCode::BAD_GATEWAY,
            SimError::Emulator(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SimError::Spawn(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SimError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error type string for JSON responses.
    pub fn error_type(&self) -> &'static str {
        match self.0 {
            SimError::NotRunning => "not_running",
            SimError::EscapePending => "escape_pending",
            SimError::StartupTimeout(_) => "startup_timeout",
            SimError::QuitTimeout(_) => "quit_timeout",
            SimError::ProcessExited => "process_exited",
            SimError::Parse(_) => "parse_error",
            SimError::Emulator(_) => "emulator_error",
            SimError::Spawn(_) => "spawn_error",
            SimError::Io(_) => "io_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "type": self.error_type(),
                "message": self.0.to_string(),
            }
        });
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_running_maps_to_conflict() {
        let err = ApiError(SimError::NotRunning);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_type(), "not_running");
    }

    #[test]
    fn emulator_error_maps_to_unprocessable() {
        let err = ApiError(SimError::Emulator("No such register".to_string()));
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.error_type(), "emulator_error");
    }

    #[test]
    fn timeouts_map_to_gateway_timeout() {
        let err = ApiError(SimError::StartupTimeout(std::time::Duration::from_secs(30)));
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn emulator_message_is_verbatim() {
        let err = ApiError(SimError::Emulator("Simulation stopped, IC: 0042".to_string()));
        assert_eq!(err.0.to_string(), "Simulation stopped, IC: 0042");
    }

    #[test]
    fn response_status_matches_mapping() {
        let response = ApiError(SimError::ProcessExited).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
