//! Bound handlers
//!
//! Each route owns one handler value that already carries the collaborators
//! it needs, so dispatching never looks anything up at request time.

use crate::application::services::NodeServices;
use crate::domain::collaborators::Miner;
use crate::infrastructure::adapters::mining_pool::MiningPoolClient;
use crate::infrastructure::http::handlers::{admin, assets::AssetServer, mining};
use crate::infrastructure::http::models::HttpRequest;
use crate::infrastructure::http::responses::ResponseFormatter;
use crate::shared::error::AppResult;
use std::sync::Arc;
use warp::reply::Response;

/// A route handler together with its collaborators
#[derive(Clone)]
pub enum BoundHandler {
    /// Static file, templated when textual
    Asset {
        assets: Arc<AssetServer>,
        node: Arc<NodeServices>,
    },

    /// `getMiningInfo` answered from the miner
    MiningInfo { miner: Arc<dyn Miner> },

    /// `submitNonce` relayed to the pool and reported to the miner
    SubmitNonce {
        pool: Arc<MiningPoolClient>,
        node: Arc<NodeServices>,
    },

    /// Any other pool request, relayed untouched
    PoolPassThrough { pool: Arc<MiningPoolClient> },

    Shutdown { node: Arc<NodeServices> },

    Rescan { node: Arc<NodeServices> },

    ChangeSettings { node: Arc<NodeServices> },

    ChangePlotDirs { node: Arc<NodeServices>, remove: bool },

    /// Plain GET on the event stream path
    UpgradeRequired,

    /// 303 to a fixed location
    Redirect(&'static str),
}

impl BoundHandler {
    /// Name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            BoundHandler::Asset { .. } => "asset",
            BoundHandler::MiningInfo { .. } => "getMiningInfo",
            BoundHandler::SubmitNonce { .. } => "submitNonce",
            BoundHandler::PoolPassThrough { .. } => "poolPassThrough",
            BoundHandler::Shutdown { .. } => "shutdown",
            BoundHandler::Rescan { .. } => "rescanPlotfiles",
            BoundHandler::ChangeSettings { .. } => "changeSettings",
            BoundHandler::ChangePlotDirs { remove: false, .. } => "addPlotDir",
            BoundHandler::ChangePlotDirs { remove: true, .. } => "removePlotDir",
            BoundHandler::UpgradeRequired => "upgradeRequired",
            BoundHandler::Redirect(_) => "redirect",
        }
    }

    /// Run the handler; errors are turned into responses by the dispatcher
    pub async fn handle(&self, request: HttpRequest) -> AppResult<Response> {
        match self {
            BoundHandler::Asset { assets, node } => Ok(assets.serve(&request, node).await),
            BoundHandler::MiningInfo { miner } => mining::mining_info(miner.as_ref()).await,
            BoundHandler::SubmitNonce { pool, node } => mining::submit_nonce(&request, pool, node).await,
            BoundHandler::PoolPassThrough { pool } => mining::pool_pass_through(&request, pool).await,
            BoundHandler::Shutdown { node } => Ok(admin::shutdown(node)),
            BoundHandler::Rescan { node } => admin::rescan_plotfiles(node).await,
            BoundHandler::ChangeSettings { node } => admin::change_settings(&request, node).await,
            BoundHandler::ChangePlotDirs { node, remove } => {
                admin::change_plot_dirs(&request, node, *remove).await
            }
            BoundHandler::UpgradeRequired => Ok(ResponseFormatter::bad_request("WebSocket upgrade required")),
            BoundHandler::Redirect(location) => Ok(ResponseFormatter::redirect(location)),
        }
    }
}
