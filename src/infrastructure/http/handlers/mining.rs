//! Mining protocol handlers
//!
//! The `/burst` endpoint miners talk to. Mining info is answered locally;
//! everything else is relayed to the pool.

use crate::application::services::NodeServices;
use crate::application::use_cases;
use crate::domain::collaborators::Miner;
use crate::domain::mining::NonceSubmission;
use crate::infrastructure::adapters::mining_pool::MiningPoolClient;
use crate::infrastructure::http::models::HttpRequest;
use crate::infrastructure::http::proxy::ProxyRelay;
use crate::infrastructure::http::responses::ResponseFormatter;
use crate::shared::error::{AppError, AppResult};
use tracing::{info, warn};
use warp::reply::Response;

/// Query parameter selecting the protocol operation
pub const REQUEST_TYPE: &str = "requestType";

/// Header some miners use instead of the `deadline` parameter
pub const DEADLINE_HEADER: &str = "x-deadline";

/// Answer `getMiningInfo` from the miner's current block
pub async fn mining_info(miner: &dyn Miner) -> AppResult<Response> {
    match miner.mining_info().await {
        Some(info) => Ok(ResponseFormatter::json_ok(&info)),
        None => Err(AppError::Upstream("No mining info received from the pool yet".to_string())),
    }
}

/// Relay a nonce to the pool and record it once the pool accepted it
pub async fn submit_nonce(
    request: &HttpRequest,
    pool: &MiningPoolClient,
    node: &NodeServices,
) -> AppResult<Response> {
    let deadline = request
        .param("deadline")
        .or_else(|| request.header(DEADLINE_HEADER));
    let submission = NonceSubmission::parse(request.param("accountId"), request.param("nonce"), deadline)?;

    let session = pool.open_session(&request.path_and_query());
    let relayed = ProxyRelay::relay(request, &session).await?;

    if relayed.status.is_success() {
        use_cases::observe_nonce_submission(node, &submission).await;
    } else {
        warn!(
            request_id = %request.request_id,
            account_id = submission.account_id,
            nonce = submission.nonce,
            status = relayed.status.as_u16(),
            "Pool refused nonce"
        );
    }

    Ok(relayed.into_response())
}

/// Relay any other `/burst` request unchanged
pub async fn pool_pass_through(request: &HttpRequest, pool: &MiningPoolClient) -> AppResult<Response> {
    // Submissions must go through `submit_nonce` so the miner sees them.
    if request.param(REQUEST_TYPE) == Some("submitNonce") {
        return Err(AppError::Validation("submitNonce must be sent with POST".to_string()));
    }

    info!(
        request_id = %request.request_id,
        request_type = request.param(REQUEST_TYPE).unwrap_or("none"),
        "Relaying request to pool"
    );
    let session = pool.open_session(&request.path_and_query());
    Ok(ProxyRelay::forward(request, &session).await)
}
