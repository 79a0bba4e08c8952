//! Error handling module
//!
//! This module provides centralized error handling for the application.
//! Every component error is converted into an HTTP response at the
//! dispatcher boundary through [`AppError::http_status_code`] and
//! [`AppError::to_json`].

use thiserror::Error;
use serde_json::Value;
use warp::http::StatusCode;

/// Application error types
#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Path escapes the asset root: {0}")]
    PathTraversal(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Upstream timed out after {timeout_ms} ms")]
    UpstreamTimeout { timeout_ms: u64 },

    #[error("Plot directory error: {0}")]
    PlotDirectory(String),

    #[error("Too many connections: limit of {limit} reached")]
    TooManyConnections { limit: usize },

    #[error("Request too large: {size} bytes (max: {limit})")]
    RequestTooLarge { size: u64, limit: u64 },

    #[error("Node is shutting down")]
    ShuttingDown,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("JSON serialization error: {0}")]
    Json(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get HTTP status code for this error
    pub fn http_status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::PathTraversal(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) | AppError::PlotDirectory(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::TooManyConnections { .. } | AppError::ShuttingDown => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::RequestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Config(_) | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short machine readable error kind used in response bodies
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Validation(_) => "validation",
            AppError::Authentication(_) => "authentication",
            AppError::NotFound(_) => "not_found",
            AppError::PathTraversal(_) => "path_traversal",
            AppError::Upstream(_) => "upstream",
            AppError::UpstreamTimeout { .. } => "upstream_timeout",
            AppError::PlotDirectory(_) => "plot_directory",
            AppError::TooManyConnections { .. } => "too_many_connections",
            AppError::RequestTooLarge { .. } => "request_too_large",
            AppError::ShuttingDown => "shutting_down",
            AppError::Io(_) => "io",
            AppError::Json(_) => "json",
            AppError::Internal(_) => "internal",
        }
    }

    /// Whether this error was caused by the caller rather than the node
    pub fn is_client_error(&self) -> bool {
        self.http_status_code().is_client_error()
    }

    /// Convert to the structured JSON error body
    pub fn to_json(&self) -> Value {
        // Internal details stay in the logs.
        let message = match self {
            AppError::Config(_) | AppError::Io(_) | AppError::Internal(_) => {
                "Internal error".to_string()
            }
            other => other.to_string(),
        };

        serde_json::json!({
            "error": {
                "code": self.http_status_code().as_u16(),
                "kind": self.kind(),
                "message": message
            }
        })
    }
}

/// Application result type
pub type AppResult<T> = Result<T, AppError>;

impl warp::reject::Reject for AppError {}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Json(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => AppError::NotFound(err.to_string()),
            _ => AppError::Io(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::UpstreamTimeout { timeout_ms: 0 }
        } else {
            AppError::Upstream(err.to_string())
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
