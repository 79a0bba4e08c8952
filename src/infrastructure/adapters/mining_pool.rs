//! Mining pool client
//!
//! Single HTTP client shared by everything that talks to the upstream pool:
//! the mining info poller and the proxy relay.

use crate::config::AppConfig;
use crate::domain::mining::MiningInfo;
use crate::infrastructure::http::proxy::ForwardSession;
use crate::shared::error::{AppError, AppResult};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error};

/// User agent sent with requests the node originates itself
pub const USER_AGENT: &str = concat!("mining-node-server/", env!("CARGO_PKG_VERSION"));

/// Client for the upstream mining pool
#[derive(Debug, Clone)]
pub struct MiningPoolClient {
    http_client: Client,
    base_url: String,
    timeout: Duration,
}

impl MiningPoolClient {
    /// Create a new mining pool client
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        Self::with_url(&config.pool.url, config.upstream_timeout())
    }

    pub fn with_url(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let http_client = Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            // Relayed responses are returned to miners as the pool sent them.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Upstream session for relaying one request to the same path on the pool
    pub fn open_session(&self, path_and_query: &str) -> ForwardSession {
        ForwardSession::new(
            self.http_client.clone(),
            format!("{}{}", self.base_url, path_and_query),
            self.timeout,
        )
    }

    /// Ask the pool for the current block parameters
    pub async fn fetch_mining_info(&self) -> AppResult<MiningInfo> {
        let url = format!("{}/burst?requestType=getMiningInfo", self.base_url);
        debug!(url = %url, "Polling pool for mining info");

        let response = self
            .http_client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.upstream_error(e))?;

        let status = response.status();
        if !status.is_success() {
            error!(status = %status, "Pool rejected mining info request");
            return Err(AppError::Upstream(format!("Pool returned status {}", status)));
        }

        let body = response.bytes().await.map_err(|e| self.upstream_error(e))?;
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Upstream(format!("Invalid mining info from pool: {}", e)))
    }

    fn upstream_error(&self, err: reqwest::Error) -> AppError {
        if err.is_timeout() {
            AppError::UpstreamTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            AppError::Upstream(err.to_string())
        }
    }
}
