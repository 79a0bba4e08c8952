//! Route configuration structures module
//!
//! Settings the route layer reads from the application configuration,
//! gathered in one place and validated before any filter is built.

use crate::config::AppConfig;
use std::time::Duration;

/// Settings for the dispatched HTTP routes
#[derive(Debug, Clone)]
pub struct DispatchRouteConfig {
    /// Maximum request body size in bytes
    pub max_request_size: u64,
    /// Whether completed requests are logged
    pub enable_logging: bool,
}

impl DispatchRouteConfig {
    /// Create dispatch route configuration from app config
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_request_size: config.server.max_request_size as u64,
            enable_logging: config.security.enable_request_logging,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_request_size == 0 {
            return Err("Max request size must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Settings for the event stream upgrade route
#[derive(Debug, Clone)]
pub struct WebSocketRouteConfig {
    /// Whether the upgrade goes through the credential guard
    pub require_auth: bool,
    /// Upper bound for a single frame write
    pub write_timeout: Duration,
}

impl WebSocketRouteConfig {
    /// Create event stream route configuration from app config
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            require_auth: config.broadcast.require_auth,
            write_timeout: config.write_timeout(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.write_timeout.is_zero() {
            return Err("Write timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Global route configuration that contains all route-specific configs
#[derive(Debug, Clone)]
pub struct RouteConfig {
    pub dispatch: DispatchRouteConfig,
    pub websocket: WebSocketRouteConfig,
}

impl RouteConfig {
    /// Create route configuration from app config
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            dispatch: DispatchRouteConfig::from_app_config(config),
            websocket: WebSocketRouteConfig::from_app_config(config),
        }
    }

    /// Validate all route configurations
    pub fn validate(&self) -> Result<(), String> {
        self.dispatch.validate()?;
        self.websocket.validate()?;
        Ok(())
    }
}
