//! Mining Node Server - control and telemetry web server for a mining node
//!
//! This library serves the node's dashboard pages, relays mining protocol
//! traffic to the upstream pool, guards the administrative actions and
//! streams live events to connected dashboards over WebSocket.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;

#[cfg(test)]
mod tests;

pub use config::AppConfig;
pub use infrastructure::http::HttpServer;
pub use shared::error::{AppError, AppResult};

/// Application result type
pub type Result<T> = std::result::Result<T, shared::error::AppError>;
