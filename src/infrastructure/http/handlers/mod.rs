//! HTTP route handlers module
//!
//! Handlers grouped by the surface they serve: the mining protocol, the
//! administrative actions, static pages and the live event stream.

pub mod admin;
pub mod assets;
pub mod mining;
pub mod websocket;

pub use assets::{AssetServer, WEBSOCKET_PATH};
pub use websocket::WebSocketRoute;
