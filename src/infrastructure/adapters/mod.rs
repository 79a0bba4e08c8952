//! Infrastructure adapters module
//!
//! This module contains adapters for external services and infrastructure concerns.

pub mod authentication;
pub mod miner;
pub mod mining_pool;
pub mod plot_store;

pub use authentication::CredentialGuard;
pub use miner::PoolMiner;
pub use mining_pool::MiningPoolClient;
pub use plot_store::PlotStore;
