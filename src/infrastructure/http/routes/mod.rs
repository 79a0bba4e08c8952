//! HTTP routes module
//!
//! The route table, the handlers bound into it and the dispatcher that walks
//! it for every request.

pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod handler;
pub mod table;

// Re-export commonly used types
pub use builder::{handle_rejection, RouteBuilder, RouteComponents};
pub use config::RouteConfig;
pub use dispatcher::Dispatcher;
pub use handler::BoundHandler;
pub use table::{AuthRequirement, PathMatcher, Route, RouteTable};
