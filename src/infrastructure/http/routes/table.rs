//! Route table
//!
//! Immutable list of (method, matcher, handler, auth) entries built once at
//! startup. Lookups take no locks. Query-qualified matchers are tried before
//! exact ones, and the asset fallback comes last; the builder refuses tables
//! in which two entries could claim the same request at the same rank.

use crate::infrastructure::http::models::HttpRequest;
use crate::infrastructure::http::routes::handler::BoundHandler;
use crate::shared::error::{AppError, AppResult};
use std::fmt;
use warp::http::Method;

/// How a route claims a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathMatcher {
    /// Path equals the literal, query ignored
    Exact(&'static str),

    /// Path equals the literal and a query parameter has a fixed value
    Query {
        path: &'static str,
        key: &'static str,
        value: &'static str,
    },

    /// Any path not claimed by another route of the same method
    Fallback,
}

impl PathMatcher {
    pub fn matches(&self, request: &HttpRequest) -> bool {
        match self {
            PathMatcher::Exact(path) => request.path == *path,
            PathMatcher::Query { path, key, value } => {
                request.path == *path && request.param(key) == Some(*value)
            }
            PathMatcher::Fallback => true,
        }
    }

    /// Whether both matchers could claim the same request at the same rank
    fn overlaps(&self, other: &PathMatcher) -> bool {
        match (self, other) {
            (PathMatcher::Exact(a), PathMatcher::Exact(b)) => a == b,
            (
                PathMatcher::Query { path: p1, key: k1, value: v1 },
                PathMatcher::Query { path: p2, key: k2, value: v2 },
            ) => p1 == p2 && (k1 != k2 || v1 == v2),
            (PathMatcher::Fallback, PathMatcher::Fallback) => true,
            _ => false,
        }
    }

    /// Higher ranks are tried first
    fn rank(&self) -> u8 {
        match self {
            PathMatcher::Query { .. } => 2,
            PathMatcher::Exact(_) => 1,
            PathMatcher::Fallback => 0,
        }
    }
}

impl fmt::Display for PathMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathMatcher::Exact(path) => write!(f, "{}", path),
            PathMatcher::Query { path, key, value } => write!(f, "{}?{}={}", path, key, value),
            PathMatcher::Fallback => write!(f, "*"),
        }
    }
}

/// Whether a route sits behind the credential guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequirement {
    None,
    Required,
}

/// A single route table entry
#[derive(Clone)]
pub struct Route {
    pub method: Method,
    pub matcher: PathMatcher,
    pub handler: BoundHandler,
    pub auth: AuthRequirement,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("matcher", &self.matcher)
            .field("handler", &self.handler.name())
            .field("auth", &self.auth)
            .finish()
    }
}

/// Immutable route table
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    /// The single route responsible for `request`, if any
    pub fn find(&self, request: &HttpRequest) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| route.method == request.method && route.matcher.matches(request))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Collects routes and validates them into a [`RouteTable`]
#[derive(Default)]
pub struct RouteTableBuilder {
    routes: Vec<Route>,
}

impl RouteTableBuilder {
    pub fn route(mut self, method: Method, matcher: PathMatcher, handler: BoundHandler, auth: AuthRequirement) -> Self {
        self.routes.push(Route {
            method,
            matcher,
            handler,
            auth,
        });
        self
    }

    pub fn public(self, method: Method, matcher: PathMatcher, handler: BoundHandler) -> Self {
        self.route(method, matcher, handler, AuthRequirement::None)
    }

    pub fn guarded(self, method: Method, matcher: PathMatcher, handler: BoundHandler) -> Self {
        self.route(method, matcher, handler, AuthRequirement::Required)
    }

    pub fn build(mut self) -> AppResult<RouteTable> {
        for (index, route) in self.routes.iter().enumerate() {
            if let Some(other) = self.routes[..index]
                .iter()
                .find(|other| other.method == route.method && other.matcher.overlaps(&route.matcher))
            {
                return Err(AppError::Config(format!(
                    "Conflicting routes for {} {}: {} and {}",
                    route.method,
                    route.matcher,
                    other.handler.name(),
                    route.handler.name()
                )));
            }
        }

        // Stable sort keeps registration order within a rank.
        self.routes.sort_by_key(|route| std::cmp::Reverse(route.matcher.rank()));
        Ok(RouteTable { routes: self.routes })
    }
}
