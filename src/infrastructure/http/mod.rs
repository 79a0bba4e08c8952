//! HTTP infrastructure module
//!
//! This module contains HTTP-related concerns including models, the server,
//! routes, utilities, responses, handlers and the pool relay.

pub mod handlers;
pub mod models;
pub mod proxy;
pub mod responses;
pub mod routes;
pub mod server;
pub mod utils;

pub use models::HttpRequest;
pub use proxy::{ForwardSession, ProxyRelay};
pub use responses::ResponseFormatter;
pub use server::HttpServer;
