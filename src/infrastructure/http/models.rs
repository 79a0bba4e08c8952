//! HTTP models
//!
//! The transport-neutral request every route handler receives.

use bytes::Bytes;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::net::SocketAddr;
use warp::http::{HeaderMap, Method};

/// An inbound request with its body fully read
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Request ID for logging
    pub request_id: String,

    pub method: Method,

    /// Path as received, still percent-encoded
    pub path: String,

    /// Raw query string without the leading `?`
    pub query: Option<String>,

    /// Decoded query parameters; the first occurrence of a key wins
    pub params: HashMap<String, String>,

    pub headers: HeaderMap,

    pub body: Bytes,

    pub remote_addr: Option<SocketAddr>,
}

impl HttpRequest {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        query: Option<String>,
        headers: HeaderMap,
        body: Bytes,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        let query = query.filter(|raw| !raw.is_empty());
        let params = query.as_deref().map(parse_query).unwrap_or_default();

        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            method,
            path: path.into(),
            query,
            params,
            headers,
            body,
            remote_addr,
        }
    }

    /// Decoded query parameter
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Header value, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Path plus query string as sent by the client
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }

    /// Client address for logs
    pub fn client_ip(&self) -> String {
        self.remote_addr
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Parse an `application/x-www-form-urlencoded` string
pub fn parse_query(raw: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for pair in raw.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.entry(decode_component(key)).or_insert_with(|| decode_component(value));
    }

    params
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
