//! Error handling for the camera server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Camera device failure (open/configure/capture)
    #[error("Device error: {0}")]
    Device(String),

    /// Validation error (index/value out of range)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown setting or resource
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation exists in the protocol but has no implementation yet
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// An invoked external operation returned a nonzero exit status
    #[error("External operation failed ({code}): {message}")]
    External { code: i32, message: String },

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Status code carried in a control-protocol error response.
    ///
    /// Mirrors the external exit status when one exists; every other
    /// failure maps to the generic -1.
    pub fn control_code(&self) -> i32 {
        match self {
            Error::External { code, .. } => *code,
            _ => -1,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Error::Device(msg) => (StatusCode::SERVICE_UNAVAILABLE, "DEVICE_ERROR", msg.clone()),
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            Error::NotImplemented(msg) => {
                (StatusCode::NOT_IMPLEMENTED, "NOT_IMPLEMENTED", msg.clone())
            }
            Error::External { code, message } => (
                StatusCode::BAD_GATEWAY,
                "EXTERNAL_ERROR",
                format!("exit status {}: {}", code, message),
            ),
            Error::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", msg.clone()),
            Error::Serialization(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SERIALIZATION_ERROR",
                e.to_string(),
            ),
            Error::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR", e.to_string()),
            Error::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        };

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_code_mirrors_external_exit_status() {
        let err = Error::External {
            code: 127,
            message: "script not found".to_string(),
        };
        assert_eq!(err.control_code(), 127);
    }

    #[test]
    fn test_control_code_defaults_to_minus_one() {
        assert_eq!(Error::Validation("bad index".to_string()).control_code(), -1);
        assert_eq!(Error::NotImplemented("setup_wifi_ap".to_string()).control_code(), -1);
    }
}
