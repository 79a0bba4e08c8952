//! Pool-backed miner adapter
//!
//! Tracks the block the pool is currently mining by polling `getMiningInfo`
//! and keeps the live miner settings. Hashing and plot reading happen
//! elsewhere; this adapter only holds the state the web layer reports.

use crate::application::broadcast_hub::BroadcastHub;
use crate::application::shutdown::ShutdownSignal;
use crate::config::app_config::MinerConfig;
use crate::domain::collaborators::Miner;
use crate::domain::events::BroadcastEvent;
use crate::domain::mining::{MinerSettings, MiningInfo, NonceSubmission, SettingsUpdate};
use crate::infrastructure::adapters::mining_pool::MiningPoolClient;
use crate::shared::error::{AppError, AppResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Miner state fed by the upstream pool
#[derive(Debug)]
pub struct PoolMiner {
    pool: Arc<MiningPoolClient>,
    mining_info: RwLock<Option<MiningInfo>>,
    settings: RwLock<MinerSettings>,
    submitted: AtomicU64,
    stopped: AtomicBool,
}

impl PoolMiner {
    pub fn new(pool: Arc<MiningPoolClient>, config: &MinerConfig) -> Self {
        Self {
            pool,
            mining_info: RwLock::new(None),
            settings: RwLock::new(MinerSettings::from(config)),
            submitted: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    /// Nonces the pool accepted since startup
    pub fn submitted_nonces(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Fetch the pool's current block once
    ///
    /// Returns the new block when the height or the generation signature
    /// changed; a fork switch can keep the height.
    pub async fn refresh(&self) -> AppResult<Option<MiningInfo>> {
        let local_deadline = self.settings.read().await.target_deadline;
        let info = self
            .pool
            .fetch_mining_info()
            .await?
            .with_local_target_deadline(local_deadline);

        let mut current = self.mining_info.write().await;
        let changed = current
            .as_ref()
            .map(|known| (known.height, known.generation_signature.as_str()))
            != Some((info.height, info.generation_signature.as_str()));
        *current = Some(info.clone());

        Ok(changed.then_some(info))
    }

    /// Poll the pool until shutdown, publishing every new block
    pub fn spawn_poller(self: Arc<Self>, hub: Arc<BroadcastHub>, interval: Duration, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.wait() => break,
                }
                if self.is_stopped() {
                    break;
                }

                match self.refresh().await {
                    Ok(Some(info)) => {
                        info!(
                            height = info.height,
                            base_target = info.base_target,
                            target_deadline = info.target_deadline,
                            "New block"
                        );
                        hub.publish(BroadcastEvent::NewBlock(info)).await;
                    }
                    Ok(None) => debug!("Block unchanged"),
                    Err(e) => warn!(error = %e, "Failed to poll pool for mining info"),
                }
            }
            debug!("Mining info poller stopped");
        })
    }
}

#[async_trait]
impl Miner for PoolMiner {
    async fn mining_info(&self) -> Option<MiningInfo> {
        self.mining_info.read().await.clone()
    }

    async fn settings(&self) -> MinerSettings {
        self.settings.read().await.clone()
    }

    async fn apply_settings(&self, update: &SettingsUpdate) -> AppResult<MinerSettings> {
        if self.is_stopped() {
            return Err(AppError::ShuttingDown);
        }

        let mut settings = self.settings.write().await;
        update.apply_to(&mut settings);

        if let Some(target_deadline) = update.target_deadline {
            let mut info = self.mining_info.write().await;
            if let Some(current) = info.take() {
                *info = Some(current.with_local_target_deadline(target_deadline));
            }
        }
        Ok(settings.clone())
    }

    async fn on_nonce_submitted(&self, submission: &NonceSubmission) {
        let total = self.submitted.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(account_id = submission.account_id, nonce = submission.nonce, total, "Nonce recorded");
    }

    async fn shutdown(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            info!(submitted_nonces = self.submitted_nonces(), "Miner stopped");
        }
    }
}
