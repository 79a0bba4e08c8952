//! Process-wide shutdown signal

use tokio::sync::watch;
use tracing::info;

/// Cloneable one-shot shutdown flag
///
/// Triggering is idempotent. Every clone observes the same flag.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    sender: watch::Sender<bool>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Request shutdown; returns `true` only for the first call
    pub fn trigger(&self) -> bool {
        let first = self.sender.send_if_modified(|stopping| {
            if *stopping {
                false
            } else {
                *stopping = true;
                true
            }
        });

        if first {
            info!("Shutdown requested");
        }
        first
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    /// Resolve once shutdown has been requested
    pub async fn wait(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = receiver.wait_for(|stopping| *stopping).await;
    }
}
