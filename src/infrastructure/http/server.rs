//! HTTP server implementation
//!
//! Wires the collaborators together, serves the routes on one listener and
//! runs the shutdown sequence: stop accepting, drain in-flight requests,
//! close every dashboard connection, stop the miner.

use crate::application::broadcast_hub::BroadcastHub;
use crate::application::services::NodeServices;
use crate::application::shutdown::ShutdownSignal;
use crate::application::use_cases;
use crate::config::AppConfig;
use crate::domain::events::LogEntry;
use crate::infrastructure::adapters::{CredentialGuard, MiningPoolClient, PlotStore, PoolMiner};
use crate::infrastructure::http::handlers::assets::AssetServer;
use crate::infrastructure::http::routes::{Dispatcher, RouteBuilder, RouteComponents, RouteConfig};
use crate::shared::error::{AppError, AppResult};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

/// Pause after draining so the last responses leave the socket
const FLUSH_DELAY: Duration = Duration::from_millis(100);

/// The node's web server
pub struct HttpServer {
    config: AppConfig,
    components: RouteComponents,
    background: Vec<JoinHandle<()>>,
}

impl HttpServer {
    /// Build the production collaborators and start their background tasks
    pub async fn new(config: AppConfig, log_entries: Option<UnboundedReceiver<LogEntry>>) -> AppResult<Self> {
        let pool = Arc::new(MiningPoolClient::new(&config)?);
        let miner = Arc::new(PoolMiner::new(pool.clone(), &config.miner));
        let plots = Arc::new(PlotStore::new(&config.miner.plot_dirs).await?);
        let hub = Arc::new(BroadcastHub::from_config(&config.broadcast));
        let shutdown = ShutdownSignal::new();

        let node = Arc::new(NodeServices::new(
            miner.clone(),
            plots,
            hub.clone(),
            shutdown.clone(),
            config.pool.url.clone(),
            config.broadcast.require_auth,
        ));

        let mut background = vec![miner.spawn_poller(
            hub.clone(),
            Duration::from_secs(config.pool.mining_info_poll_seconds),
            shutdown,
        )];
        if let Some(entries) = log_entries {
            background.push(hub.forward_logs(entries));
        }

        let components = RouteComponents {
            node,
            pool,
            assets: Arc::new(AssetServer::from_config(&config.assets)),
            guard: Arc::new(CredentialGuard::from_config(&config.security)),
        };

        Ok(Self::from_parts(config, components, background))
    }

    /// Assemble a server from already built collaborators
    pub fn from_parts(config: AppConfig, components: RouteComponents, background: Vec<JoinHandle<()>>) -> Self {
        Self {
            config,
            components,
            background,
        }
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn node(&self) -> &Arc<NodeServices> {
        &self.components.node
    }

    /// Serve until shutdown is requested, then tear everything down
    #[instrument(skip(self))]
    pub async fn run(self) -> AppResult<()> {
        let addr: SocketAddr = self
            .config
            .server_address()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid server address: {}", e)))?;

        // warp panics on bind errors; bind once first so they surface as errors here.
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::Config(format!("Cannot listen on {}: {}", addr, e)))?;
        drop(listener);

        let route_config = RouteConfig::from_app_config(&self.config);
        let (dispatcher, routes) = RouteBuilder::build_routes(&route_config, &self.components)?;

        let node = self.components.node.clone();
        info!(
            address = %addr,
            pool = node.pool_url(),
            admin_enabled = self.components.guard.is_configured(),
            "Starting node web server"
        );

        tokio::select! {
            _ = warp::serve(routes).run(addr) => {
                error!("HTTP server stopped unexpectedly");
            }
            _ = node.shutdown.wait() => {
                info!("Shutting down web server");
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for interrupt");
                }
                info!("Interrupt received");
                use_cases::request_shutdown(&node);
            }
        }

        self.drain(&dispatcher).await;

        node.hub.close_all().await;
        node.miner.shutdown().await;
        for task in &self.background {
            task.abort();
        }

        info!("Web server stopped");
        Ok(())
    }

    /// Wait for in-flight requests, bounded by the grace period
    async fn drain(&self, dispatcher: &Dispatcher) {
        let grace = Duration::from_secs(self.config.server.shutdown_grace_seconds);
        let started = Instant::now();

        while dispatcher.in_flight() > 0 {
            if started.elapsed() >= grace {
                warn!(in_flight = dispatcher.in_flight(), "Grace period over, abandoning requests");
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(FLUSH_DELAY).await;
    }
}
