//! Credential guard for administrative routes
//!
//! Credentials are accepted from, in order:
//! `Authorization: Bearer <secret>`, `Authorization: Basic <user:secret>`,
//! `X-Auth-Token: <secret>` and the `token` query parameter.

use crate::config::app_config::SecurityConfig;
use crate::domain::security::SecretDigest;
use crate::infrastructure::http::models::HttpRequest;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashMap;
use tracing::warn;
use warp::http::header::AUTHORIZATION;
use warp::http::HeaderMap;

/// Header carrying a bare secret
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Query parameter carrying a bare secret
pub const AUTH_TOKEN_PARAM: &str = "token";

/// Credentials as presented by a client
#[derive(Debug, PartialEq, Eq)]
struct PresentedCredentials {
    user: Option<String>,
    secret: String,
}

/// Checks request credentials against the configured secret
#[derive(Debug, Clone)]
pub struct CredentialGuard {
    user: String,
    secret: SecretDigest,
}

impl CredentialGuard {
    pub fn new(user: impl Into<String>, secret: &str) -> Self {
        Self {
            user: user.into(),
            secret: SecretDigest::new(secret),
        }
    }

    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(config.user.clone(), &config.secret)
    }

    /// Whether a secret is configured at all
    pub fn is_configured(&self) -> bool {
        self.secret.is_configured()
    }

    /// Check the credentials carried by a request
    pub fn check_credentials(&self, request: &HttpRequest) -> bool {
        let accepted = self.check(&request.headers, &request.params);
        if !accepted {
            warn!(
                request_id = %request.request_id,
                client_ip = %request.client_ip(),
                path = %request.path,
                "Rejected request with missing or invalid credentials"
            );
        }
        accepted
    }

    /// Check credentials from raw headers and query parameters
    pub fn check(&self, headers: &HeaderMap, params: &HashMap<String, String>) -> bool {
        if !self.secret.is_configured() {
            return false;
        }

        match Self::extract(headers, params) {
            Some(presented) => {
                // Evaluate both sides so a wrong user costs the same as a wrong secret.
                let user_ok = match (&presented.user, self.user.is_empty()) {
                    (Some(user), false) => *user == self.user,
                    _ => true,
                };
                let secret_ok = self.secret.matches(&presented.secret);
                user_ok & secret_ok
            }
            None => false,
        }
    }

    fn extract(headers: &HeaderMap, params: &HashMap<String, String>) -> Option<PresentedCredentials> {
        if let Some(value) = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok()) {
            let (scheme, credentials) = value.trim().split_once(' ')?;
            let credentials = credentials.trim();

            if scheme.eq_ignore_ascii_case("bearer") {
                return Some(PresentedCredentials {
                    user: None,
                    secret: credentials.to_string(),
                });
            }
            if scheme.eq_ignore_ascii_case("basic") {
                let decoded = STANDARD.decode(credentials).ok()?;
                let decoded = String::from_utf8(decoded).ok()?;
                let (user, secret) = decoded.split_once(':')?;
                return Some(PresentedCredentials {
                    user: Some(user.to_string()),
                    secret: secret.to_string(),
                });
            }
            return None;
        }

        if let Some(token) = headers.get(AUTH_TOKEN_HEADER).and_then(|value| value.to_str().ok()) {
            return Some(PresentedCredentials {
                user: None,
                secret: token.trim().to_string(),
            });
        }

        params.get(AUTH_TOKEN_PARAM).map(|token| PresentedCredentials {
            user: None,
            secret: token.clone(),
        })
    }
}
