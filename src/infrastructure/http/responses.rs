//! HTTP responses module
//!
//! This module contains the canned responses every route handler builds on.

use crate::shared::error::AppError;
use serde::Serialize;
use serde_json::Value;
use warp::http::header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION, WWW_AUTHENTICATE};
use warp::http::{HeaderValue, StatusCode};
use warp::reply::{Reply, Response};

/// Realm announced to clients that were refused
pub const AUTH_REALM: &str = "Basic realm=\"mining-node\"";

/// Response formatter for HTTP responses
pub struct ResponseFormatter;

impl ResponseFormatter {
    /// JSON body with the given status
    pub fn json<T: Serialize>(body: &T, status: StatusCode) -> Response {
        warp::reply::with_status(warp::reply::json(body), status).into_response()
    }

    /// 200 with a JSON body
    pub fn json_ok<T: Serialize>(body: &T) -> Response {
        Self::json(body, StatusCode::OK)
    }

    /// Raw bytes with a content type
    pub fn content(body: Vec<u8>, content_type: &str, no_cache: bool) -> Response {
        let mut response = body.into_response();
        if let Ok(value) = HeaderValue::from_str(content_type) {
            response.headers_mut().insert(CONTENT_TYPE, value);
        }
        if no_cache {
            response
                .headers_mut()
                .insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        }
        response
    }

    /// 400 with a message
    pub fn bad_request(message: &str) -> Response {
        Self::from_app_error(&AppError::Validation(message.to_string()))
    }

    /// 404
    pub fn not_found() -> Response {
        Self::from_app_error(&AppError::NotFound("No such resource".to_string()))
    }

    /// 401 with a Basic challenge
    pub fn unauthorized() -> Response {
        let mut response =
            Self::from_app_error(&AppError::Authentication("Missing or invalid credentials".to_string()));
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static(AUTH_REALM));
        response
    }

    /// 502, or 504 when the upstream timed out
    pub fn gateway_error(error: &AppError) -> Response {
        match error {
            AppError::UpstreamTimeout { .. } => Self::from_app_error(error),
            other => Self::from_app_error(&AppError::Upstream(other.to_string())),
        }
    }

    /// 503 with a message
    pub fn service_unavailable(message: &str) -> Response {
        Self::json(
            &serde_json::json!({
                "error": {
                    "code": StatusCode::SERVICE_UNAVAILABLE.as_u16(),
                    "kind": "unavailable",
                    "message": message
                }
            }),
            StatusCode::SERVICE_UNAVAILABLE,
        )
    }

    /// 303 See Other pointing at `location`
    pub fn redirect(location: &str) -> Response {
        match HeaderValue::from_str(location) {
            Ok(value) => {
                let mut response =
                    warp::reply::with_status(warp::reply(), StatusCode::SEE_OTHER).into_response();
                response.headers_mut().insert(LOCATION, value);
                response
            }
            Err(_) => Self::bad_request("Invalid redirect target"),
        }
    }

    /// Structured error body with the error's status code
    pub fn from_app_error(error: &AppError) -> Response {
        Self::json(&error.to_json(), error.http_status_code())
    }

    /// Body of a successful administrative action
    pub fn action(action: &str, details: Value) -> Response {
        Self::json_ok(&serde_json::json!({
            "status": "ok",
            "action": action,
            "details": details
        }))
    }
}
