//! Node services
//!
//! The collaborator references bound into request handlers, bundled with the
//! broadcast hub and the shutdown signal they report to.

use crate::application::broadcast_hub::{BroadcastHub, Subscription};
use crate::application::shutdown::ShutdownSignal;
use crate::domain::collaborators::{Miner, NodeServer};
use crate::domain::events::BroadcastEvent;
use crate::domain::mining::NodeConfigSnapshot;
use crate::shared::error::AppResult;
use std::sync::Arc;

/// Version reported to dashboards and pages
pub const NODE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Collaborators shared by every handler
#[derive(Clone)]
pub struct NodeServices {
    pub miner: Arc<dyn Miner>,
    pub server: Arc<dyn NodeServer>,
    pub hub: Arc<BroadcastHub>,
    pub shutdown: ShutdownSignal,
    pool_url: String,
    websocket_requires_auth: bool,
}

impl NodeServices {
    pub fn new(
        miner: Arc<dyn Miner>,
        server: Arc<dyn NodeServer>,
        hub: Arc<BroadcastHub>,
        shutdown: ShutdownSignal,
        pool_url: impl Into<String>,
        websocket_requires_auth: bool,
    ) -> Self {
        Self {
            miner,
            server,
            hub,
            shutdown,
            pool_url: pool_url.into(),
            websocket_requires_auth,
        }
    }

    pub fn pool_url(&self) -> &str {
        &self.pool_url
    }

    /// Current configuration as pushed to dashboards
    pub async fn config_snapshot(&self) -> NodeConfigSnapshot {
        let mining_info = self.miner.mining_info().await;
        let settings = self.miner.settings().await;
        let plot_dirs = self.server.plot_directories().await;
        let total_plot_bytes = plot_dirs.iter().map(|dir| dir.total_bytes).sum();

        NodeConfigSnapshot {
            version: NODE_VERSION.to_string(),
            mining_info,
            pool_url: self.pool_url.clone(),
            settings,
            plot_dirs,
            total_plot_bytes,
            websocket_requires_auth: self.websocket_requires_auth,
        }
    }

    /// Register a dashboard connection with a consistent first snapshot
    pub async fn subscribe(&self) -> AppResult<Subscription> {
        self.hub.subscribe_with(|| self.config_snapshot()).await
    }

    /// Push the current configuration to every dashboard
    pub async fn publish_config(&self) -> usize {
        let snapshot = self.config_snapshot().await;
        self.hub.publish(BroadcastEvent::Config(snapshot)).await
    }
}
