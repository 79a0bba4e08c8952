//! Administrative handlers
//!
//! Every handler here sits behind the credential guard.

use crate::application::services::NodeServices;
use crate::application::use_cases;
use crate::domain::mining::SettingsUpdate;
use crate::infrastructure::http::models::HttpRequest;
use crate::infrastructure::http::responses::ResponseFormatter;
use crate::shared::error::{AppError, AppResult};
use serde::Deserialize;
use serde_json::json;
use warp::reply::Response;

#[derive(Debug, Deserialize)]
struct PlotDirBody {
    path: String,
}

pub async fn rescan_plotfiles(node: &NodeServices) -> AppResult<Response> {
    let summary = use_cases::rescan_plotfiles(node).await?;
    Ok(ResponseFormatter::action("rescanPlotfiles", serde_json::to_value(&summary)?))
}

/// Acknowledge first; teardown starts once the server loop sees the signal
pub fn shutdown(node: &NodeServices) -> Response {
    use_cases::request_shutdown(node);
    ResponseFormatter::action("shutdown", json!({}))
}

pub async fn change_settings(request: &HttpRequest, node: &NodeServices) -> AppResult<Response> {
    let update = SettingsUpdate::from_json(&request.body)?;
    let settings = use_cases::change_settings(node, &update).await?;
    Ok(ResponseFormatter::action("changeSettings", serde_json::to_value(&settings)?))
}

pub async fn change_plot_dirs(request: &HttpRequest, node: &NodeServices, remove: bool) -> AppResult<Response> {
    let path = plot_dir_from_request(request)?;
    let directory = use_cases::change_plot_dirs(node, &path, remove).await?;
    let action = if remove { "removePlotDir" } else { "addPlotDir" };
    Ok(ResponseFormatter::action(action, serde_json::to_value(&directory)?))
}

/// The directory comes as a JSON object, a JSON string, plain text, or the
/// `path` query parameter when the body is empty
fn plot_dir_from_request(request: &HttpRequest) -> AppResult<String> {
    let body = std::str::from_utf8(&request.body)
        .map_err(|_| AppError::Validation("Plot directory must be UTF-8 text".to_string()))?
        .trim();

    let path = if body.is_empty() {
        request.param("path").unwrap_or_default().to_string()
    } else if body.starts_with('{') {
        serde_json::from_str::<PlotDirBody>(body)?.path
    } else if body.starts_with('"') {
        serde_json::from_str::<String>(body)?
    } else {
        body.to_string()
    };

    if path.trim().is_empty() {
        return Err(AppError::Validation("Plot directory path is required".to_string()));
    }
    Ok(path)
}
