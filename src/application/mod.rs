//! Application layer
//!
//! Orchestrates collaborators on behalf of HTTP handlers: the broadcast hub,
//! the shutdown signal and the administrative use cases.

pub mod broadcast_hub;
pub mod services;
pub mod shutdown;
pub mod use_cases;

pub use broadcast_hub::{BroadcastHub, Subscription};
pub use services::NodeServices;
pub use shutdown::ShutdownSignal;
