//! Application configuration structures
//!
//! This module contains the main configuration structures for the application.
//! Every section has its own defaults so a partial `Conf` file is enough.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use validator::Validate;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Server address to bind to
    pub bind_address: IpAddr,

    /// Server port
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    /// Maximum request body size in bytes
    #[validate(range(min = 1024, max = 10485760))] // 1KB to 10MB
    pub max_request_size: usize,

    /// Worker threads (0 for auto-detect)
    #[validate(range(min = 0, max = 64))]
    pub worker_threads: usize,

    /// How long in-flight requests may run after a shutdown was requested
    #[validate(range(min = 0, max = 300))]
    pub shutdown_grace_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8124,
            max_request_size: 1024 * 1024, // 1MB
            worker_threads: 0,
            shutdown_grace_seconds: 5,
        }
    }
}

/// Upstream mining pool configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PoolConfig {
    /// Pool base URL, e.g. "http://pool.example.com:8124"
    #[validate(url)]
    pub url: String,

    /// Timeout for a single forwarded request, in milliseconds
    #[validate(range(min = 100, max = 300000))]
    pub timeout_ms: u64,

    /// Interval between `getMiningInfo` polls, in seconds
    #[validate(range(min = 1, max = 600))]
    pub mining_info_poll_seconds: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8125".to_string(),
            timeout_ms: 30_000,
            mining_info_poll_seconds: 3,
        }
    }
}

/// Static asset configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AssetsConfig {
    /// Directory all static assets are served from
    #[validate(length(min = 1))]
    pub root: String,

    /// File served for `/`
    #[validate(length(min = 1))]
    pub index: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: "public".to_string(),
            index: "index.html".to_string(),
        }
    }
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SecurityConfig {
    /// Optional user name expected in Basic credentials
    pub user: String,

    /// Secret guarding administrative routes (empty = every guarded request is rejected)
    pub secret: String,

    /// Enable request logging
    pub enable_request_logging: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            secret: String::new(),
            enable_request_logging: true,
        }
    }
}

/// Live broadcast (WebSocket) configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Require credentials for the WebSocket upgrade
    pub require_auth: bool,

    /// Upper bound for a single frame write before the connection is dropped
    #[validate(range(min = 10, max = 60000))]
    pub write_timeout_ms: u64,

    /// Events buffered per connection before it is considered lagging
    #[validate(range(min = 1, max = 10000))]
    pub queue_capacity: usize,

    /// Log entries kept for the current block
    #[validate(range(min = 0, max = 100000))]
    pub backlog_capacity: usize,

    /// Maximum concurrent WebSocket connections
    #[validate(range(min = 1, max = 10000))]
    pub max_connections: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            require_auth: false,
            write_timeout_ms: 5_000,
            queue_capacity: 256,
            backlog_capacity: 1_000,
            max_connections: 64,
        }
    }
}

/// Miner configuration seeded into the miner at startup
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MinerConfig {
    /// Plot directories scanned at startup
    pub plot_dirs: Vec<String>,

    /// Deadlines above this many seconds are not submitted
    #[validate(range(min = 1))]
    pub target_deadline: u64,

    /// Number of concurrent hashing workers (0 = one per core)
    #[validate(range(min = 0, max = 1024))]
    pub mining_intensity: u32,

    /// Number of concurrent plot readers (0 = one per directory)
    #[validate(range(min = 0, max = 1024))]
    pub max_plot_readers: u32,

    /// Read buffer size in megabytes
    #[validate(range(min = 1, max = 65536))]
    pub buffer_size_mb: u64,

    /// Retries for a rejected submission
    #[validate(range(min = 0, max = 100))]
    pub submission_max_retry: u32,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            plot_dirs: Vec::new(),
            target_deadline: 86_400 * 30,
            mining_intensity: 0,
            max_plot_readers: 0,
            buffer_size_mb: 128,
            submission_max_retry: 3,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    #[validate(length(min = 1))]
    pub level: String,

    /// Log format ("text" or "json")
    #[validate(length(min = 1))]
    pub format: String,

    /// Forward log lines to connected dashboards
    pub broadcast: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            broadcast: true,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Upstream pool configuration
    pub pool: PoolConfig,

    /// Static asset configuration
    pub assets: AssetsConfig,

    /// Security configuration
    pub security: SecurityConfig,

    /// Broadcast configuration
    pub broadcast: BroadcastConfig,

    /// Miner configuration
    pub miner: MinerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Environment variable prefix, e.g. `MINER_NODE__SERVER__PORT=9000`
    pub const ENV_PREFIX: &'static str = "MINER_NODE";

    /// Load configuration from the `Conf` file and environment variables
    pub fn load() -> crate::Result<Self> {
        Self::load_from("Conf")
    }

    /// Load configuration from a named file (any format `config` understands)
    /// layered under environment variables
    pub fn load_from(file_name: &str) -> crate::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(file_name).required(false))
            .add_source(
                config::Environment::with_prefix(Self::ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("miner.plot_dirs")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::shared::error::AppError::Config(format!("Failed to build configuration: {}", e)))?;

        let config: AppConfig = config.try_deserialize()
            .map_err(|e| crate::shared::error::AppError::Config(format!("Failed to deserialize configuration: {}", e)))?;

        config.validate_config()
            .map_err(|e| crate::shared::error::AppError::Validation(format!("Configuration validation failed: {}", e)))?;
        crate::config::ConfigValidator::validate_config(&config)?;

        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate_config(&self) -> Result<(), validator::ValidationErrors> {
        self.server.validate()?;
        self.pool.validate()?;
        self.assets.validate()?;
        self.security.validate()?;
        self.broadcast.validate()?;
        self.miner.validate()?;
        self.logging.validate()?;

        Ok(())
    }

    /// Get server address as string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    /// Timeout applied to every forwarded pool request
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.pool.timeout_ms)
    }

    /// Timeout applied to every WebSocket frame write
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.broadcast.write_timeout_ms)
    }
}
