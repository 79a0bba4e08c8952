//! Configuration validation module
//!
//! This module provides additional validation logic for configuration
//! beyond the basic validator crate validation.

use crate::config::AppConfig;
use crate::shared::error::AppError;
use std::path::Path;

/// Configuration validator for additional validation logic
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the complete configuration
    pub fn validate_config(config: &AppConfig) -> crate::Result<()> {
        Self::validate_pool_url(&config.pool.url)?;
        Self::validate_assets(&config.assets)?;
        Self::validate_security(config);
        Self::validate_logging(&config.logging)?;

        Ok(())
    }

    /// Validate the upstream pool URL
    fn validate_pool_url(url: &str) -> crate::Result<()> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AppError::Validation(
                "Pool URL must start with http:// or https://".to_string()
            ));
        }

        if url.contains('?') || url.contains('#') {
            return Err(AppError::Validation(
                "Pool URL must not carry a query or fragment".to_string()
            ));
        }

        Ok(())
    }

    /// Validate the asset settings
    fn validate_assets(assets: &crate::config::app_config::AssetsConfig) -> crate::Result<()> {
        let index = Path::new(&assets.index);
        if index.is_absolute() || assets.index.contains("..") {
            return Err(AppError::Validation(
                format!("Index file must be relative to the asset root: {}", assets.index)
            ));
        }

        if !Path::new(&assets.root).is_dir() {
            tracing::warn!(root = %assets.root, "Asset root does not exist, static pages will return 404");
        }

        Ok(())
    }

    /// Warn about settings that make the admin surface unusable or open
    fn validate_security(config: &AppConfig) {
        if config.security.secret.is_empty() {
            tracing::warn!("No admin secret configured, every administrative request will be rejected");
        }

        if !config.broadcast.require_auth && !config.server.bind_address.is_loopback() {
            tracing::warn!(
                bind_address = %config.server.bind_address,
                "Live log stream is reachable without credentials on a public interface"
            );
        }
    }

    /// Validate logging settings
    fn validate_logging(logging: &crate::config::app_config::LoggingConfig) -> crate::Result<()> {
        if !["text", "json"].contains(&logging.format.as_str()) {
            return Err(AppError::Validation(
                format!("Invalid log format: {}", logging.format)
            ));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&logging.level.to_lowercase().as_str()) {
            return Err(AppError::Validation(
                format!("Invalid log level: {}", logging.level)
            ));
        }

        Ok(())
    }
}
