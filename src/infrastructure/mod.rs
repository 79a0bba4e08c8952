//! Infrastructure layer - External concerns and adapters
//!
//! This module contains the collaborator adapters (pool, miner state, plot
//! directories, credentials) and HTTP handling.

pub mod adapters;
pub mod http;

pub use adapters::{CredentialGuard, MiningPoolClient, PlotStore, PoolMiner};
