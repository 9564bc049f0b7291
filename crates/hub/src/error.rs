//! Errors the control core hands back to the command surface.
//!
//! Every variant is a rejected operation: the device state is left exactly as
//! it was before the call.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type Result<T> = std::result::Result<T, ControlError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    /// The other exclusive control mode is still requested.
    #[error("{0}")]
    ModeConflict(String),

    /// Actuator command issued while manual control is not requested.
    #[error("Manual mode is not active")]
    ModeNotActive,

    /// Malformed or out-of-range input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Manual alarm cannot be silenced while fire is detected.
    #[error("Cannot turn off alarm while fire is detected")]
    AlarmLatchBlocked,
}

impl ControlError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::ModeNotActive => StatusCode::FORBIDDEN,
            Self::ModeConflict(_) | Self::AlarmLatchBlocked => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        tracing::warn!(status = %self.status_code(), "request rejected: {self}");
        let body = Json(json!({
            "status": "error",
            "message": self.to_string(),
        }));
        (self.status_code(), body).into_response()
    }
}
