// src/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// JSON body returned for every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

/// Main application error type.
///
/// Startup-time variants (`ConfigParse`, `ConfigSchema`, `Login`) abort the
/// process; per-request variants are converted into HTTP responses at the
/// request boundary and never crash the server.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Could not parse configuration file: invalid format ({message})")]
    ConfigParse { message: String },

    #[error("Could not parse configuration file: invalid schema")]
    ConfigSchema { errors: Vec<String> },

    #[error("Configuration is not loaded; call ConfigStore::load() first")]
    ConfigNotLoaded,

    #[error("No token provided")]
    Unauthorized,

    #[error("Cannot process invalid data")]
    PayloadValidation { detail: String },

    #[error("Failed to deliver message to Matrix: {message}")]
    Dispatch { message: String },

    #[error("Matrix login failed: {message}")]
    Login { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::Dispatch {
            message: message.into(),
        }
    }

    /// HTTP status code this error maps to at the request boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::PayloadValidation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Dispatch { .. } | Self::Login { .. } | Self::HttpClient(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::ConfigParse { .. }
            | Self::ConfigSchema { .. }
            | Self::ConfigNotLoaded
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log the error with the appropriate level. Server-side failures log
    /// their full diagnostics; client errors log the detail we keep out of
    /// the response body.
    pub fn log(&self) {
        match self {
            Self::PayloadValidation { detail } => {
                warn!(error = %self, detail = %detail, "Client error occurred");
            }
            Self::ConfigSchema { errors } => {
                error!(error = %self, schema.errors = ?errors, "Application error occurred");
            }
            _ if self.status_code().is_client_error() => {
                warn!(error = %self, "Client error occurred");
            }
            _ => {
                error!(error = %self, "Application error occurred");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
            status: status.as_u16(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for the application.
pub type Result<T, E = AppError> = std::result::Result<T, E>;
