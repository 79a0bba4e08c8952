//! Request dispatcher
//!
//! Finds the one route responsible for a request, runs the credential guard
//! when the route asks for it and converts handler errors into responses.
//! Nothing is invoked for a request that matches no route.

use crate::application::shutdown::ShutdownSignal;
use crate::infrastructure::adapters::authentication::CredentialGuard;
use crate::infrastructure::http::models::HttpRequest;
use crate::infrastructure::http::responses::ResponseFormatter;
use crate::infrastructure::http::routes::table::{AuthRequirement, RouteTable};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};
use warp::reply::Response;

/// Routes requests through the route table
pub struct Dispatcher {
    table: RouteTable,
    guard: Arc<CredentialGuard>,
    shutdown: ShutdownSignal,
    in_flight: AtomicUsize,
    log_requests: bool,
}

/// Keeps the in-flight count up while a request runs
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Dispatcher {
    pub fn new(table: RouteTable, guard: Arc<CredentialGuard>, shutdown: ShutdownSignal, log_requests: bool) -> Self {
        Self {
            table,
            guard,
            shutdown,
            in_flight: AtomicUsize::new(0),
            log_requests,
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Requests currently being handled
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub async fn dispatch(&self, request: HttpRequest) -> Response {
        let _in_flight = InFlight::enter(&self.in_flight);
        let started = Instant::now();
        let request_id = request.request_id.clone();
        let method = request.method.clone();
        let path = request.path.clone();

        let (handler, response) = self.route(request).await;

        if self.log_requests {
            debug!(
                request_id = %request_id,
                method = %method,
                path = %path,
                handler = handler,
                status = response.status().as_u16(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Request completed"
            );
        }
        response
    }

    async fn route(&self, request: HttpRequest) -> (&'static str, Response) {
        if self.shutdown.is_triggered() {
            return ("none", ResponseFormatter::service_unavailable("Node is shutting down"));
        }

        let Some(route) = self.table.find(&request) else {
            return ("none", ResponseFormatter::not_found());
        };
        let name = route.handler.name();

        if route.auth == AuthRequirement::Required && !self.guard.check_credentials(&request) {
            return (name, ResponseFormatter::unauthorized());
        }

        let request_id = request.request_id.clone();
        match route.handler.handle(request).await {
            Ok(response) => (name, response),
            Err(e) => {
                if e.is_client_error() {
                    debug!(request_id = %request_id, handler = name, error = %e, "Request refused");
                } else {
                    error!(request_id = %request_id, handler = name, error = %e, "Request failed");
                }
                (name, ResponseFormatter::from_app_error(&e))
            }
        }
    }
}
