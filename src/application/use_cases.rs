//! Administrative use cases
//!
//! Each use case mutates node state through a collaborator and then pushes the
//! resulting configuration to dashboards before returning, so the update is
//! queued ahead of anything published afterwards.

use crate::application::services::NodeServices;
use crate::domain::events::BroadcastEvent;
use crate::domain::mining::{MinerSettings, NonceSubmission, PlotDirectory, PlotSummary, SettingsUpdate};
use crate::shared::error::{AppError, AppResult};
use tracing::info;

/// Rescan every plot directory
pub async fn rescan_plotfiles(node: &NodeServices) -> AppResult<PlotSummary> {
    let summary = node.server.rescan_plot_directories().await?;
    info!(
        directories = summary.directories.len(),
        plot_files = summary.plot_files,
        total_bytes = summary.total_bytes,
        "Plot directories rescanned"
    );

    node.publish_config().await;
    Ok(summary)
}

/// Apply a validated settings change to the miner
pub async fn change_settings(node: &NodeServices, update: &SettingsUpdate) -> AppResult<MinerSettings> {
    let settings = node.miner.apply_settings(update).await?;
    info!(?update, "Miner settings changed");

    node.publish_config().await;
    Ok(settings)
}

/// Add or remove a plot directory
pub async fn change_plot_dirs(node: &NodeServices, path: &str, remove: bool) -> AppResult<PlotDirectory> {
    let path = path.trim();
    if path.is_empty() {
        return Err(AppError::Validation("Plot directory path is empty".to_string()));
    }

    let directory = if remove {
        let directory = node.server.remove_plot_directory(path).await?;
        info!(path = %directory.path, "Plot directory removed");
        directory
    } else {
        let directory = node.server.add_plot_directory(path).await?;
        info!(
            path = %directory.path,
            plot_files = directory.plot_files,
            total_bytes = directory.total_bytes,
            "Plot directory added"
        );
        directory
    };

    node.publish_config().await;
    Ok(directory)
}

/// Record a nonce the pool accepted and tell dashboards about it
pub async fn observe_nonce_submission(node: &NodeServices, submission: &NonceSubmission) {
    node.miner.on_nonce_submitted(submission).await;
    info!(
        account_id = submission.account_id,
        nonce = submission.nonce,
        deadline = ?submission.deadline,
        "Nonce forwarded to pool"
    );

    node.hub
        .publish(BroadcastEvent::NonceSubmitted(submission.clone()))
        .await;
}

/// Ask the node to stop
///
/// The server loop watches the shutdown signal and performs the actual
/// teardown once the triggering response has been written.
pub fn request_shutdown(node: &NodeServices) {
    if node.shutdown.trigger() {
        node.server.request_shutdown();
    }
}
