//! Live event stream
//!
//! Dashboards connect to [`WEBSOCKET_PATH`](super::assets::WEBSOCKET_PATH),
//! receive a snapshot frame and then every broadcast event in publish order.
//! A connection whose writes stall past the write timeout is closed.

use crate::application::broadcast_hub::{BroadcastHub, Subscription};
use crate::application::services::NodeServices;
use crate::infrastructure::adapters::authentication::CredentialGuard;
use crate::infrastructure::http::models::parse_query;
use crate::infrastructure::http::responses::ResponseFormatter;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use warp::http::HeaderMap;
use warp::reply::{Reply, Response};
use warp::ws::{Message, WebSocket, Ws};

/// Everything the upgrade handler needs
pub struct WebSocketRoute {
    pub node: Arc<NodeServices>,
    pub guard: Arc<CredentialGuard>,
    pub require_auth: bool,
    pub write_timeout: Duration,
}

impl WebSocketRoute {
    /// Accept or refuse an upgrade request
    pub async fn upgrade(&self, ws: Ws, headers: HeaderMap, query: String) -> Response {
        if self.require_auth && !self.guard.check(&headers, &parse_query(&query)) {
            warn!("Refused dashboard connection with missing or invalid credentials");
            return ResponseFormatter::unauthorized();
        }

        let subscription = match self.node.subscribe().await {
            Ok(subscription) => subscription,
            Err(e) => return ResponseFormatter::from_app_error(&e),
        };

        let hub = self.node.hub.clone();
        let write_timeout = self.write_timeout;
        ws.on_upgrade(move |socket| run_connection(socket, subscription, hub, write_timeout))
            .into_response()
    }
}

/// Pump queued frames to the socket until either side goes away
pub async fn run_connection(
    socket: WebSocket,
    subscription: Subscription,
    hub: Arc<BroadcastHub>,
    write_timeout: Duration,
) {
    let Subscription { id, mut receiver } = subscription;
    let (mut sink, mut stream) = socket.split();
    info!(connection_id = %id, "Dashboard connected");

    loop {
        tokio::select! {
            frame = receiver.recv() => {
                let Some(frame) = frame else {
                    // Dropped by the hub: lagging, or the node is shutting down.
                    break;
                };
                match timeout(write_timeout, sink.send(Message::text(frame.to_string()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(connection_id = %id, error = %e, "Dashboard write failed");
                        break;
                    }
                    Err(_) => {
                        warn!(connection_id = %id, timeout_ms = write_timeout.as_millis() as u64, "Dashboard write timed out");
                        break;
                    }
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(message)) if message.is_close() => break,
                    Some(Ok(message)) => {
                        if message.to_str() == Ok("ping") {
                            let pong = timeout(write_timeout, sink.send(Message::text("pong"))).await;
                            if !matches!(pong, Ok(Ok(()))) {
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        debug!(connection_id = %id, error = %e, "Dashboard read failed");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    hub.unsubscribe(id).await;
    let _ = timeout(write_timeout, sink.send(Message::close())).await;
    info!(connection_id = %id, "Dashboard disconnected");
}
