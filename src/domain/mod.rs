//! Domain layer
//!
//! Core types and rules of the node's web surface: mining data, broadcast
//! events, page templating, secret handling and the collaborator traits.

pub mod collaborators;
pub mod events;
pub mod mining;
pub mod security;
pub mod template;

pub use collaborators::{Miner, NodeServer};
pub use events::{BroadcastEvent, LogEntry};
pub use mining::{
    MinerSettings, MiningInfo, NodeConfigSnapshot, NonceSubmission, PlotDirectory, PlotSummary,
    SettingsUpdate,
};
pub use security::SecretDigest;
pub use template::TemplateVariables;
