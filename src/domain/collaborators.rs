//! Collaborator interfaces
//!
//! The web layer never mines or reads plots itself. It talks to the miner and
//! to the node server through these traits, so handlers can be bound to real
//! adapters in production and to recording doubles in tests.

use crate::domain::mining::{
    MinerSettings, MiningInfo, NonceSubmission, PlotDirectory, PlotSummary, SettingsUpdate,
};
use crate::shared::error::AppResult;
use async_trait::async_trait;

/// The mining engine
#[async_trait]
pub trait Miner: Send + Sync {
    /// Parameters of the block currently mined, if one is known yet
    async fn mining_info(&self) -> Option<MiningInfo>;

    async fn settings(&self) -> MinerSettings;

    /// Apply a validated settings change and return the resulting settings
    async fn apply_settings(&self, update: &SettingsUpdate) -> AppResult<MinerSettings>;

    /// Record a nonce the pool accepted for forwarding
    async fn on_nonce_submitted(&self, submission: &NonceSubmission);

    /// Stop mining
    async fn shutdown(&self);
}

/// Node-level services: plot storage and lifecycle
#[async_trait]
pub trait NodeServer: Send + Sync {
    async fn plot_directories(&self) -> Vec<PlotDirectory>;

    async fn rescan_plot_directories(&self) -> AppResult<PlotSummary>;

    async fn add_plot_directory(&self, path: &str) -> AppResult<PlotDirectory>;

    async fn remove_plot_directory(&self, path: &str) -> AppResult<PlotDirectory>;

    /// Stop background node work ahead of process exit
    fn request_shutdown(&self);
}
