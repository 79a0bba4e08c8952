//! HTTP utilities - Common helper functions
//!
//! Filters shared by the route definitions: dependency injection and request
//! extraction.

use crate::infrastructure::http::models::HttpRequest;
use crate::shared::error::AppError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use warp::http::{HeaderMap, Method};
use warp::path::FullPath;
use warp::{Filter, Rejection};

/// Helper function to inject a shared component into a route
pub fn with_shared<T>(
    component: Arc<T>,
) -> impl Filter<Extract = (Arc<T>,), Error = std::convert::Infallible> + Clone
where
    T: Send + Sync + ?Sized,
{
    warp::any().map(move || component.clone())
}

/// Raw query string, empty when the request has none
pub fn raw_query() -> impl Filter<Extract = (String,), Error = std::convert::Infallible> + Clone {
    warp::query::raw()
        .or(warp::any().map(String::new))
        .unify()
}

/// Request body, refused once it exceeds `limit` bytes
///
/// A declared `Content-Length` is checked before reading. Bodies without one
/// are read chunk by chunk and refused as soon as the limit is crossed, so an
/// oversized body is never buffered whole.
pub fn body_with_limit(limit: u64) -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and_then(move |length: Option<u64>| async move {
            match length {
                Some(size) if size > limit => Err(warp::reject::custom(AppError::RequestTooLarge { size, limit })),
                _ => Ok(()),
            }
        })
        .untuple_one()
        .and(collect_limited(warp::body::stream(), limit))
}

fn collect_limited<F, S, B>(stream: F, limit: u64) -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone
where
    F: Filter<Extract = (S,), Error = Rejection> + Clone,
    S: Stream<Item = Result<B, warp::Error>> + Send + 'static,
    B: Buf + Send + 'static,
{
    stream.and_then(move |stream: S| read_limited(stream, limit))
}

/// Collect a body stream, stopping at the first chunk that crosses `limit`
pub async fn read_limited<S, B>(stream: S, limit: u64) -> Result<Bytes, Rejection>
where
    S: Stream<Item = Result<B, warp::Error>>,
    B: Buf,
{
    futures::pin_mut!(stream);
    let mut body = BytesMut::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            warp::reject::custom(AppError::Validation(format!("Failed to read request body: {}", e)))
        })?;

        let size = body.len() as u64 + chunk.remaining() as u64;
        if size > limit {
            return Err(warp::reject::custom(AppError::RequestTooLarge { size, limit }));
        }
        body.put(chunk);
    }

    Ok(body.freeze())
}

/// Extract the whole request as an [`HttpRequest`]
pub fn http_request(limit: u64) -> impl Filter<Extract = (HttpRequest,), Error = Rejection> + Clone {
    warp::method()
        .and(warp::path::full())
        .and(raw_query())
        .and(warp::header::headers_cloned())
        .and(body_with_limit(limit))
        .and(warp::addr::remote())
        .map(
            |method: Method,
             path: FullPath,
             query: String,
             headers: HeaderMap,
             body: Bytes,
             remote: Option<SocketAddr>| {
                HttpRequest::new(method, path.as_str(), Some(query), headers, body, remote)
            },
        )
}
