//! Broadcast events
//!
//! Everything pushed to dashboards over the live connection. Each event is a
//! JSON text frame tagged with a `type` field.

use crate::domain::mining::{MiningInfo, NodeConfigSnapshot, NonceSubmission};
use crate::shared::error::AppResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single log line forwarded to dashboards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub target: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl LogEntry {
    pub fn new(level: impl Into<String>, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level: level.into(),
            target: target.into(),
            message: message.into(),
            fields: serde_json::Map::new(),
        }
    }
}

/// Events delivered to every open dashboard connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// First frame on every connection
    Snapshot {
        config: NodeConfigSnapshot,
        backlog: Vec<LogEntry>,
    },

    /// Configuration or plot storage changed
    Config(NodeConfigSnapshot),

    Log(LogEntry),

    /// A new block started; the log backlog restarts with it
    NewBlock(MiningInfo),

    NonceSubmitted(NonceSubmission),

    /// Last frame before the node closes every connection
    Shutdown,
}

impl BroadcastEvent {
    /// Serialize to the text frame sent on the wire
    pub fn to_frame(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Event name as it appears in the `type` field
    pub fn name(&self) -> &'static str {
        match self {
            BroadcastEvent::Snapshot { .. } => "snapshot",
            BroadcastEvent::Config(_) => "config",
            BroadcastEvent::Log(_) => "log",
            BroadcastEvent::NewBlock(_) => "newBlock",
            BroadcastEvent::NonceSubmitted(_) => "nonceSubmitted",
            BroadcastEvent::Shutdown => "shutdown",
        }
    }
}
