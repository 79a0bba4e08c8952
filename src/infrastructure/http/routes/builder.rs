//! Route builder module
//!
//! Binds every handler to its collaborators, builds the route table and
//! combines the dispatcher with the event stream upgrade into one filter.

use crate::application::services::NodeServices;
use crate::infrastructure::adapters::authentication::CredentialGuard;
use crate::infrastructure::adapters::mining_pool::MiningPoolClient;
use crate::infrastructure::http::handlers::assets::AssetServer;
use crate::infrastructure::http::handlers::mining::REQUEST_TYPE;
use crate::infrastructure::http::handlers::websocket::WebSocketRoute;
use crate::infrastructure::http::models::HttpRequest;
use crate::infrastructure::http::responses::ResponseFormatter;
use crate::infrastructure::http::routes::config::RouteConfig;
use crate::infrastructure::http::routes::dispatcher::Dispatcher;
use crate::infrastructure::http::routes::handler::BoundHandler;
use crate::infrastructure::http::routes::table::{PathMatcher, RouteTable};
use crate::infrastructure::http::utils::{http_request, raw_query, with_shared};
use crate::shared::error::{AppError, AppResult};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;
use warp::http::{HeaderMap, Method};
use warp::reply::Response;
use warp::ws::Ws;
use warp::{Filter, Rejection};

const BURST_PATH: &str = "/burst";

/// Administrative paths; a plain GET on any of them lands on the dashboard
const ADMIN_PATHS: &[&str] = &["/shutdown", "/rescan", "/settings", "/plotdirs/add", "/plotdirs/remove"];

/// Collaborators every route is bound to
#[derive(Clone)]
pub struct RouteComponents {
    pub node: Arc<NodeServices>,
    pub pool: Arc<MiningPoolClient>,
    pub assets: Arc<AssetServer>,
    pub guard: Arc<CredentialGuard>,
}

/// Route builder that orchestrates the creation of all application routes
pub struct RouteBuilder;

impl RouteBuilder {
    /// Build the route table with every handler bound
    pub fn build_table(components: &RouteComponents) -> AppResult<RouteTable> {
        let RouteComponents { node, pool, assets, .. } = components;

        let mining_info = PathMatcher::Query {
            path: BURST_PATH,
            key: REQUEST_TYPE,
            value: "getMiningInfo",
        };
        let submit_nonce = PathMatcher::Query {
            path: BURST_PATH,
            key: REQUEST_TYPE,
            value: "submitNonce",
        };

        let mut builder = RouteTable::builder()
            .public(
                Method::GET,
                mining_info.clone(),
                BoundHandler::MiningInfo { miner: node.miner.clone() },
            )
            .public(
                Method::POST,
                mining_info,
                BoundHandler::MiningInfo { miner: node.miner.clone() },
            )
            .public(
                Method::POST,
                submit_nonce,
                BoundHandler::SubmitNonce {
                    pool: pool.clone(),
                    node: node.clone(),
                },
            )
            .public(
                Method::GET,
                PathMatcher::Exact(BURST_PATH),
                BoundHandler::PoolPassThrough { pool: pool.clone() },
            )
            .public(
                Method::POST,
                PathMatcher::Exact(BURST_PATH),
                BoundHandler::PoolPassThrough { pool: pool.clone() },
            )
            .public(Method::GET, PathMatcher::Exact("/ws"), BoundHandler::UpgradeRequired)
            .guarded(
                Method::POST,
                PathMatcher::Exact("/shutdown"),
                BoundHandler::Shutdown { node: node.clone() },
            )
            .guarded(
                Method::POST,
                PathMatcher::Exact("/rescan"),
                BoundHandler::Rescan { node: node.clone() },
            )
            .guarded(
                Method::POST,
                PathMatcher::Exact("/settings"),
                BoundHandler::ChangeSettings { node: node.clone() },
            )
            .guarded(
                Method::POST,
                PathMatcher::Exact("/plotdirs/add"),
                BoundHandler::ChangePlotDirs {
                    node: node.clone(),
                    remove: false,
                },
            )
            .guarded(
                Method::POST,
                PathMatcher::Exact("/plotdirs/remove"),
                BoundHandler::ChangePlotDirs {
                    node: node.clone(),
                    remove: true,
                },
            );

        for path in ADMIN_PATHS {
            builder = builder.public(Method::GET, PathMatcher::Exact(*path), BoundHandler::Redirect("/"));
        }

        let table = builder
            .public(
                Method::GET,
                PathMatcher::Fallback,
                BoundHandler::Asset {
                    assets: assets.clone(),
                    node: node.clone(),
                },
            )
            .build()?;

        for route in table.routes() {
            debug!(method = %route.method, path = %route.matcher, handler = route.handler.name(), "Route registered");
        }
        Ok(table)
    }

    /// Build the complete filter: event stream upgrade first, then dispatch
    pub fn build_routes(
        config: &RouteConfig,
        components: &RouteComponents,
    ) -> AppResult<(Arc<Dispatcher>, impl Filter<Extract = (Response,), Error = Infallible> + Clone)> {
        config.validate().map_err(AppError::Config)?;

        let table = Self::build_table(components)?;
        let dispatcher = Arc::new(Dispatcher::new(
            table,
            components.guard.clone(),
            components.node.shutdown.clone(),
            config.dispatch.enable_logging,
        ));

        let websocket = Arc::new(WebSocketRoute {
            node: components.node.clone(),
            guard: components.guard.clone(),
            require_auth: config.websocket.require_auth,
            write_timeout: config.websocket.write_timeout,
        });

        let ws_route = warp::path("ws")
            .and(warp::path::end())
            .and(warp::get())
            .and(warp::ws())
            .and(warp::header::headers_cloned())
            .and(raw_query())
            .and(with_shared(websocket))
            .then(|ws: Ws, headers: HeaderMap, query: String, route: Arc<WebSocketRoute>| async move {
                route.upgrade(ws, headers, query).await
            });

        let dispatch_route = http_request(config.dispatch.max_request_size)
            .and(with_shared(dispatcher.clone()))
            .then(|request: HttpRequest, dispatcher: Arc<Dispatcher>| async move { dispatcher.dispatch(request).await });

        let routes = ws_route
            .or(dispatch_route)
            .unify()
            .recover(handle_rejection)
            .unify();

        Ok((dispatcher, routes))
    }
}

/// Turn rejections from the extraction filters into responses
pub async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let response = if let Some(error) = rejection.find::<AppError>() {
        ResponseFormatter::from_app_error(error)
    } else if rejection.is_not_found() {
        ResponseFormatter::not_found()
    } else {
        debug!(rejection = ?rejection, "Malformed request");
        ResponseFormatter::bad_request("Malformed request")
    };
    Ok(response)
}
