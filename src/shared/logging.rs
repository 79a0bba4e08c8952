//! Logging utilities module
//!
//! This module provides centralized logging setup. Besides the usual stdout
//! output, the node's own INFO and higher events can be forwarded to
//! connected dashboards through [`BroadcastLogLayer`].

use crate::config::app_config::LoggingConfig;
use crate::domain::events::LogEntry;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Events from this crate are forwarded, except the hub's own diagnostics,
/// which would otherwise feed back into the hub.
const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");
const HUB_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::application::broadcast_hub");

/// Logging utilities for the application
pub struct LoggingUtils;

impl LoggingUtils {
    /// Initialize logging with the specified configuration
    ///
    /// `RUST_LOG` overrides the configured level when set.
    pub fn initialize(config: &LoggingConfig, broadcast: Option<BroadcastLogLayer>) -> crate::Result<()> {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.level));

        let output = if config.format == "json" {
            fmt::layer()
                .json()
                .with_current_span(false)
                .with_thread_ids(true)
                .boxed()
        } else {
            fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .boxed()
        };

        tracing_subscriber::registry()
            .with(output)
            .with(broadcast)
            .with(filter)
            .try_init()
            .map_err(|e| crate::shared::error::AppError::Internal(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Layer that turns log events into [`LogEntry`] values for the broadcast hub
///
/// Entries go through an unbounded channel so logging never waits on the hub.
#[derive(Debug, Clone)]
pub struct BroadcastLogLayer {
    sender: mpsc::UnboundedSender<LogEntry>,
}

impl BroadcastLogLayer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LogEntry>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn is_forwarded(level: &Level, target: &str) -> bool {
        *level <= Level::INFO && target.starts_with(CRATE_TARGET) && !target.starts_with(HUB_TARGET)
    }
}

impl<S> Layer<S> for BroadcastLogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !Self::is_forwarded(metadata.level(), metadata.target()) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let entry = LogEntry {
            timestamp: Utc::now(),
            level: metadata.level().to_string(),
            target: metadata.target().to_string(),
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
        };

        // The hub may already be gone during shutdown.
        let _ = self.sender.send(entry);
    }
}

/// Collects the message and structured fields of an event
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: serde_json::Map<String, serde_json::Value>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let value = format!("{:?}", value);
        match field.name() {
            "message" => self.message = Some(value),
            name => {
                self.fields.insert(name.to_string(), serde_json::Value::String(value));
            }
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            name => {
                self.fields
                    .insert(name.to_string(), serde_json::Value::String(value.to_string()));
            }
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), value.into());
    }
}
