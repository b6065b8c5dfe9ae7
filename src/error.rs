#[cfg(feature = "rest-api")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[cfg(feature = "rest-api")]
use serde_json::json;

use crate::config::ConfigError;
use crate::control::ControlError;
use crate::port::UartError;

/// A specialized `Result` type for REST handlers (only when the rest-api feature is enabled).
#[cfg(feature = "rest-api")]
pub type AppResult<T> = Result<T, AppError>;

/// Unified application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error(transparent)]
    Uart(#[from] UartError),

    #[error("The request payload is invalid: {0}")]
    InvalidPayload(String),

    #[error("An I/O error occurred: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "ConfigError",
            Self::Control(ControlError::UnknownPort(_)) => "UnknownPort",
            Self::Control(ControlError::PortExists(_)) => "PortExists",
            Self::Control(ControlError::InvalidRequest(_)) => "InvalidRequest",
            Self::Control(ControlError::Uart(_)) | Self::Uart(_) => "UartError",
            Self::Control(ControlError::Bind { .. }) => "BindError",
            Self::Control(ControlError::EngineStopped) => "EngineStopped",
            Self::InvalidPayload(_) => "InvalidPayload",
            Self::Io(_) => "IoError",
            Self::Logging(_) => "LoggingError",
        }
    }
}

/// Allows Axum to convert `AppError` into an HTTP response (only when rest-api feature enabled).
#[cfg(feature = "rest-api")]
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Control(ControlError::UnknownPort(_)) => StatusCode::NOT_FOUND,
            Self::Control(ControlError::PortExists(_) | ControlError::Bind { .. }) => {
                StatusCode::CONFLICT
            }
            Self::Control(ControlError::InvalidRequest(_)) | Self::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Control(ControlError::Uart(UartError::UnsupportedParameter(_)))
            | Self::Uart(UartError::UnsupportedParameter(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = axum::Json(json!({
            "status": "error",
            "error": { "type": self.kind(), "message": self.to_string() }
        }));
        (status, body).into_response()
    }
}
