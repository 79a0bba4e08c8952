//! Proxy relay
//!
//! Forwards a request to the upstream pool and copies the answer back. The
//! upstream status code and body reach the client unchanged; connection-level
//! headers and the node's own credentials are never relayed.

use crate::infrastructure::http::models::HttpRequest;
use crate::infrastructure::http::responses::ResponseFormatter;
use crate::shared::error::{AppError, AppResult};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use warp::http::{HeaderName, HeaderValue, StatusCode};
use warp::reply::{Reply, Response};

/// Headers that describe a single connection and must not cross the relay
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Request headers the client library recomputes or that must stay local
const REQUEST_ONLY: &[&str] = &["host", "content-length", "authorization", "x-auth-token"];

/// Upstream connection for relaying one request
#[derive(Debug, Clone)]
pub struct ForwardSession {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl ForwardSession {
    pub fn new(client: reqwest::Client, url: String, timeout: Duration) -> Self {
        Self { client, url, timeout }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn timeout_error(&self) -> AppError {
        AppError::UpstreamTimeout {
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }
}

/// Upstream answer, fully buffered
#[derive(Debug, Clone)]
pub struct RelayedResponse {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: bytes::Bytes,
}

impl RelayedResponse {
    pub fn into_response(self) -> Response {
        let mut response = self.body.to_vec().into_response();
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        headers.clear();
        for (name, value) in self.headers {
            headers.append(name, value);
        }
        response
    }
}

/// Relays requests to the upstream pool
pub struct ProxyRelay;

impl ProxyRelay {
    /// Forward `request` and build the client response
    ///
    /// Connection failures become 502 and an expired timeout becomes 504.
    pub async fn forward(request: &HttpRequest, session: &ForwardSession) -> Response {
        match Self::relay(request, session).await {
            Ok(relayed) => relayed.into_response(),
            Err(e) => {
                warn!(
                    request_id = %request.request_id,
                    upstream = %session.url,
                    error = %e,
                    "Upstream request failed"
                );
                ResponseFormatter::gateway_error(&e)
            }
        }
    }

    /// Forward `request` and return the buffered upstream answer
    pub async fn relay(request: &HttpRequest, session: &ForwardSession) -> AppResult<RelayedResponse> {
        let started = Instant::now();
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| AppError::Validation(format!("Unsupported method: {}", e)))?;

        let mut builder = session
            .client
            .request(method, &session.url)
            .timeout(session.timeout);

        for (name, value) in request.headers.iter() {
            if Self::is_forwarded_request_header(name.as_str()) {
                builder = builder.header(name.as_str(), value.as_bytes());
            }
        }

        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let upstream = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                session.timeout_error()
            } else {
                AppError::Upstream(format!("Failed to reach pool: {}", e))
            }
        })?;

        let status = StatusCode::from_u16(upstream.status().as_u16())
            .map_err(|e| AppError::Upstream(format!("Invalid upstream status: {}", e)))?;

        let headers = upstream
            .headers()
            .iter()
            .filter(|(name, _)| Self::is_forwarded_response_header(name.as_str()))
            .filter_map(|(name, value)| {
                let name = HeaderName::from_bytes(name.as_str().as_bytes()).ok()?;
                let value = HeaderValue::from_bytes(value.as_bytes()).ok()?;
                Some((name, value))
            })
            .collect();

        // A body that breaks off midway is an upstream failure, never a
        // truncated success.
        let body = upstream.bytes().await.map_err(|e| {
            if e.is_timeout() {
                session.timeout_error()
            } else {
                AppError::Upstream(format!("Upstream body was cut short: {}", e))
            }
        })?;

        debug!(
            request_id = %request.request_id,
            upstream = %session.url,
            status = status.as_u16(),
            bytes = body.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Relayed upstream response"
        );

        Ok(RelayedResponse { status, headers, body })
    }

    fn is_forwarded_request_header(name: &str) -> bool {
        !HOP_BY_HOP.contains(&name) && !REQUEST_ONLY.contains(&name)
    }

    fn is_forwarded_response_header(name: &str) -> bool {
        !HOP_BY_HOP.contains(&name) && name != "content-length"
    }
}
