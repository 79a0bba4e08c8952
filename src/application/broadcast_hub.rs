//! Broadcast hub
//!
//! Registry of live dashboard connections. Every event is serialized once and
//! queued to each connection while the registry lock is held, which gives all
//! connections the same event order. Queues are bounded: a connection that
//! cannot keep up is dropped instead of slowing everyone else down.
//!
//! Log lines of the current block are kept in a bounded backlog and replayed
//! to new connections in their snapshot frame.

use crate::config::app_config::BroadcastConfig;
use crate::domain::events::{BroadcastEvent, LogEntry};
use crate::domain::mining::NodeConfigSnapshot;
use crate::shared::error::{AppError, AppResult};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// A serialized event frame shared by every connection it is queued to
pub type Frame = Arc<str>;

/// Receiving side of a registered connection
#[derive(Debug)]
pub struct Subscription {
    pub id: Uuid,
    pub receiver: mpsc::Receiver<Frame>,
}

#[derive(Debug, Default)]
struct HubState {
    connections: HashMap<Uuid, mpsc::Sender<Frame>>,
    backlog: VecDeque<LogEntry>,
    closed: bool,
}

/// Fan-out of node events to dashboard connections
#[derive(Debug)]
pub struct BroadcastHub {
    state: Mutex<HubState>,
    queue_capacity: usize,
    backlog_capacity: usize,
    max_connections: usize,
}

impl BroadcastHub {
    pub fn new(queue_capacity: usize, backlog_capacity: usize, max_connections: usize) -> Self {
        Self {
            state: Mutex::new(HubState::default()),
            queue_capacity: queue_capacity.max(1),
            backlog_capacity,
            max_connections,
        }
    }

    pub fn from_config(config: &BroadcastConfig) -> Self {
        Self::new(config.queue_capacity, config.backlog_capacity, config.max_connections)
    }

    /// Register a connection with an already captured configuration
    pub async fn subscribe(&self, config: NodeConfigSnapshot) -> AppResult<Subscription> {
        self.subscribe_with(|| async move { config }).await
    }

    /// Register a connection, taking its configuration snapshot under the
    /// registry lock
    ///
    /// The snapshot frame (configuration plus the current block's backlog) is
    /// queued before the connection becomes visible to `publish`, so it is
    /// always the first frame the connection sees. No event can be published
    /// between taking the snapshot and registering, so a concurrent change is
    /// either in the snapshot or delivered after it. `snapshot` must not call
    /// back into the hub.
    pub async fn subscribe_with<F, Fut>(&self, snapshot: F) -> AppResult<Subscription>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = NodeConfigSnapshot>,
    {
        let mut state = self.state.lock().await;

        if state.closed {
            return Err(AppError::ShuttingDown);
        }
        if state.connections.len() >= self.max_connections {
            warn!(limit = self.max_connections, "Rejecting dashboard connection, limit reached");
            return Err(AppError::TooManyConnections { limit: self.max_connections });
        }

        let config = snapshot().await;
        let snapshot = BroadcastEvent::Snapshot {
            config,
            backlog: state.backlog.iter().cloned().collect(),
        };
        let frame: Frame = snapshot.to_frame()?.into();

        // One extra slot so the snapshot never eats into the regular queue.
        let (sender, receiver) = mpsc::channel(self.queue_capacity + 1);
        sender
            .try_send(frame)
            .map_err(|e| AppError::Internal(format!("Failed to queue snapshot: {}", e)))?;

        let id = Uuid::new_v4();
        state.connections.insert(id, sender);
        debug!(connection_id = %id, connections = state.connections.len(), "Dashboard connection registered");

        Ok(Subscription { id, receiver })
    }

    /// Remove a connection; unknown ids are ignored
    pub async fn unsubscribe(&self, id: Uuid) {
        let mut state = self.state.lock().await;
        if state.connections.remove(&id).is_some() {
            debug!(connection_id = %id, connections = state.connections.len(), "Dashboard connection removed");
        }
    }

    /// Queue an event to every open connection
    ///
    /// Returns the number of connections the event was queued to.
    pub async fn publish(&self, event: BroadcastEvent) -> usize {
        let frame: Frame = match event.to_frame() {
            Ok(frame) => frame.into(),
            Err(e) => {
                error!(event = event.name(), error = %e, "Failed to serialize broadcast event");
                return 0;
            }
        };

        let mut state = self.state.lock().await;
        if state.closed {
            return 0;
        }

        match event {
            BroadcastEvent::Log(entry) => {
                if self.backlog_capacity > 0 {
                    if state.backlog.len() >= self.backlog_capacity {
                        state.backlog.pop_front();
                    }
                    state.backlog.push_back(entry);
                }
            }
            BroadcastEvent::NewBlock(_) => state.backlog.clear(),
            _ => {}
        }

        Self::deliver(&mut state, &frame)
    }

    fn deliver(state: &mut HubState, frame: &Frame) -> usize {
        let mut delivered = 0;
        let mut stale = Vec::new();

        for (id, sender) in &state.connections {
            match sender.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(connection_id = %id, "Dashboard connection is lagging, dropping it");
                    stale.push(*id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => stale.push(*id),
            }
        }

        for id in stale {
            state.connections.remove(&id);
        }

        delivered
    }

    /// Send the shutdown frame and release every connection
    ///
    /// Connections drain what is already queued and then close. Later
    /// subscriptions are refused.
    pub async fn close_all(&self) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }

        match BroadcastEvent::Shutdown.to_frame() {
            Ok(frame) => {
                let frame: Frame = frame.into();
                Self::deliver(&mut state, &frame);
            }
            Err(e) => error!(error = %e, "Failed to serialize shutdown event"),
        }

        state.closed = true;
        state.connections.clear();
        state.backlog.clear();
    }

    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.connections.len()
    }

    pub async fn backlog(&self) -> Vec<LogEntry> {
        self.state.lock().await.backlog.iter().cloned().collect()
    }

    /// Publish log entries coming from the tracing layer until the sender side
    /// is dropped
    pub fn forward_logs(self: Arc<Self>, mut entries: mpsc::UnboundedReceiver<LogEntry>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(entry) = entries.recv().await {
                self.publish(BroadcastEvent::Log(entry)).await;
            }
        })
    }
}
