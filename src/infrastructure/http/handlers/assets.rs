//! Static asset handler
//!
//! Serves files below the configured asset root. Textual assets pass through
//! the template engine so pages can embed live node values.

use crate::application::services::{NodeServices, NODE_VERSION};
use crate::config::app_config::AssetsConfig;
use crate::domain::mining::{format_capacity, MiningInfo, NodeConfigSnapshot};
use crate::domain::template::TemplateVariables;
use crate::infrastructure::http::models::HttpRequest;
use crate::infrastructure::http::responses::ResponseFormatter;
use crate::shared::error::{AppError, AppResult};
use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use warp::reply::Response;

/// Path of the live event stream, exposed to pages as `%WS_PATH%`
pub const WEBSOCKET_PATH: &str = "/ws";

/// A loaded asset, rendered if textual
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub content_type: String,
    pub body: Vec<u8>,
    pub templated: bool,
}

impl Asset {
    /// Rendered pages depend on live state and must not be cached
    pub fn into_response(self) -> Response {
        ResponseFormatter::content(self.body, &self.content_type, self.templated)
    }
}

/// Serves files from a single root directory
#[derive(Debug, Clone)]
pub struct AssetServer {
    root: PathBuf,
    index: String,
}

impl AssetServer {
    pub fn new(root: impl Into<PathBuf>, index: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            index: index.into(),
        }
    }

    pub fn from_config(config: &AssetsConfig) -> Self {
        Self::new(&config.root, &config.index)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path onto a file below the root
    ///
    /// The path is percent-decoded before any check, so encoded `..`
    /// segments are caught as well. Symlinks that lead outside the root are
    /// refused after canonicalization.
    pub async fn resolve(&self, request_path: &str) -> AppResult<PathBuf> {
        let decoded = percent_decode_str(request_path)
            .decode_utf8()
            .map_err(|_| AppError::PathTraversal(request_path.to_string()))?;

        if decoded.contains('\\') || decoded.contains('\0') {
            return Err(AppError::PathTraversal(request_path.to_string()));
        }

        let mut relative = PathBuf::new();
        for component in Path::new(decoded.trim_start_matches('/')).components() {
            match component {
                Component::Normal(segment) => relative.push(segment),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(AppError::PathTraversal(request_path.to_string()));
                }
            }
        }

        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|e| AppError::NotFound(format!("Asset root unavailable: {}", e)))?;

        let mut candidate = tokio::fs::canonicalize(root.join(&relative))
            .await
            .map_err(|_| AppError::NotFound(request_path.to_string()))?;

        if tokio::fs::metadata(&candidate).await?.is_dir() {
            candidate = tokio::fs::canonicalize(candidate.join(&self.index))
                .await
                .map_err(|_| AppError::NotFound(request_path.to_string()))?;
        }

        if !candidate.starts_with(&root) {
            return Err(AppError::PathTraversal(request_path.to_string()));
        }
        if !tokio::fs::metadata(&candidate).await?.is_file() {
            return Err(AppError::NotFound(request_path.to_string()));
        }

        Ok(candidate)
    }

    /// Read and render the asset at `path`, or `None` when it cannot be served
    pub async fn load(&self, path: &str, variables: &TemplateVariables) -> Option<Asset> {
        let file = match self.resolve(path).await {
            Ok(file) => file,
            Err(AppError::PathTraversal(attempt)) => {
                warn!(path = %attempt, "Refused asset path outside the asset root");
                return None;
            }
            Err(e) => {
                debug!(path = %path, error = %e, "Asset not found");
                return None;
            }
        };

        let bytes = match tokio::fs::read(&file).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "Failed to read asset");
                return None;
            }
        };

        let mime = mime_guess::from_path(&file).first_or_octet_stream();
        if !is_textual(&mime) {
            return Some(Asset {
                content_type: mime.essence_str().to_string(),
                body: bytes,
                templated: false,
            });
        }

        match String::from_utf8(bytes) {
            Ok(text) => Some(Asset {
                content_type: format!("{}; charset=utf-8", mime.essence_str()),
                body: variables.inject(&text).into_bytes(),
                templated: true,
            }),
            // Not actually text; serve it untouched.
            Err(e) => Some(Asset {
                content_type: mime.essence_str().to_string(),
                body: e.into_bytes(),
                templated: false,
            }),
        }
    }

    /// Load the asset at `path` as a response
    pub async fn load_asset_by_path(&self, path: &str, variables: &TemplateVariables) -> Option<Response> {
        self.load(path, variables).await.map(Asset::into_response)
    }

    /// Load the asset named by the request path
    pub async fn load_asset(&self, request: &HttpRequest, variables: &TemplateVariables) -> Option<Response> {
        self.load_asset_by_path(&request.path, variables).await
    }

    /// Serve the request path or answer 404
    pub async fn serve(&self, request: &HttpRequest, node: &NodeServices) -> Response {
        let variables = page_variables(node).await;
        match self.load_asset(request, &variables).await {
            Some(response) => response,
            None => ResponseFormatter::not_found(),
        }
    }
}

fn is_textual(mime: &mime_guess::Mime) -> bool {
    mime.type_() == mime_guess::mime::TEXT
        || matches!(mime.subtype().as_str(), "javascript" | "json" | "xml" | "svg")
        || mime.suffix().map(|suffix| suffix.as_str()) == Some("xml")
}

/// Variables available to every served page
///
/// Node state is captured once per request; each value is only formatted if
/// the page actually uses it.
pub async fn page_variables(node: &NodeServices) -> TemplateVariables {
    let mining: Arc<Option<MiningInfo>> = Arc::new(node.miner.mining_info().await);
    let config: Arc<NodeConfigSnapshot> = Arc::new(node.config_snapshot().await);
    let mut variables = TemplateVariables::new();

    register(&mut variables, "VERSION", || NODE_VERSION.to_string());
    register(&mut variables, "WS_PATH", || WEBSOCKET_PATH.to_string());

    let info = mining.clone();
    register(&mut variables, "HEIGHT", move || {
        mining_field(&info, |info| info.height.to_string())
    });
    let info = mining.clone();
    register(&mut variables, "BASE_TARGET", move || {
        mining_field(&info, |info| info.base_target.to_string())
    });
    let info = mining.clone();
    register(&mut variables, "GENERATION_SIGNATURE", move || {
        mining_field(&info, |info| info.generation_signature.clone())
    });

    let info = mining;
    let snapshot = config.clone();
    register(&mut variables, "TARGET_DEADLINE", move || match info.as_ref() {
        Some(info) => info.target_deadline.to_string(),
        None => snapshot.settings.target_deadline.to_string(),
    });

    let snapshot = config.clone();
    register(&mut variables, "POOL_URL", move || snapshot.pool_url.clone());
    let snapshot = config.clone();
    register(&mut variables, "PLOT_SIZE", move || format_capacity(snapshot.total_plot_bytes));
    let snapshot = config.clone();
    register(&mut variables, "PLOT_DIRS", move || {
        snapshot
            .plot_dirs
            .iter()
            .map(|dir| dir.path.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    });
    register(&mut variables, "CONFIG", move || {
        serde_json::to_string(config.as_ref()).unwrap_or_default()
    });

    variables
}

fn register<F>(variables: &mut TemplateVariables, key: &str, producer: F)
where
    F: Fn() -> String + Send + Sync + 'static,
{
    if let Err(e) = variables.insert(key, producer) {
        warn!(key, error = %e, "Skipping page variable");
    }
}

fn mining_field(mining: &Option<MiningInfo>, field: fn(&MiningInfo) -> String) -> String {
    mining.as_ref().map(field).unwrap_or_default()
}
