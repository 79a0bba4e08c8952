//! Test suite for the mining node web server
//!
//! In-file unit tests live next to the code they cover. This tree holds the
//! shared doubles and the tests that drive the assembled routes:
//! - `common`: collaborator doubles, a fake pool, route components
//! - `integration`: HTTP and WebSocket behaviour through the full filter

pub mod common;
pub mod integration;

/// Test configuration and utilities
pub mod config {
    use crate::config::AppConfig;
    use std::sync::Once;

    static INIT: Once = Once::new();

    /// Initialize test environment
    pub fn init() {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter("debug")
                .with_test_writer()
                .try_init();
        });
    }

    /// Create test configuration
    pub fn test_config() -> AppConfig {
        let mut config = AppConfig::default();

        config.server.port = 0;
        config.server.bind_address = "127.0.0.1".parse().unwrap();
        config.server.max_request_size = 4096;
        config.security.secret = "test-secret".to_string();

        config
    }
}

/// Test utilities and helpers
pub mod utils {
    use std::time::Duration;
    use tokio::time::sleep;

    /// Wait for a condition to be true
    pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            if condition().await {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_initialization() {
        config::init();
        let test_config = config::test_config();
        assert_eq!(test_config.server.port, 0);
        assert!(!test_config.security.secret.is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_gives_up() {
        let met = utils::wait_for(|| async { false }, std::time::Duration::from_millis(30)).await;
        assert!(!met);
    }
}
