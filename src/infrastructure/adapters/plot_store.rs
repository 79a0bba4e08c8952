//! Plot directory registry
//!
//! Filesystem-backed [`NodeServer`]: keeps the configured plot directories and
//! what the last scan found in each of them. Plot files are recognised by
//! name only (`<account>_<start nonce>_<nonces>[_<stagger>]`); their
//! contents are never read.

use crate::domain::collaborators::NodeServer;
use crate::domain::mining::{PlotDirectory, PlotSummary};
use crate::shared::error::{AppError, AppResult};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// `<account>_<start nonce>_<nonces>` with an optional `_<stagger>`
const PLOT_FILE_PATTERN: &str = r"^\d+_\d+_\d+(_\d+)?$";

/// Registry of plot directories
#[derive(Debug)]
pub struct PlotStore {
    pattern: Regex,
    directories: RwLock<Vec<PlotDirectory>>,
    stopping: AtomicBool,
}

impl PlotStore {
    /// Create the registry and scan the initial directories
    ///
    /// Directories that cannot be read are kept with zero plots so they show
    /// up on the dashboard and can be removed there.
    pub async fn new(paths: &[String]) -> AppResult<Self> {
        let pattern = Regex::new(PLOT_FILE_PATTERN)
            .map_err(|e| AppError::Internal(format!("Invalid plot file pattern: {}", e)))?;

        let mut directories: Vec<PlotDirectory> = Vec::with_capacity(paths.len());
        for path in paths {
            if directories.iter().any(|dir| dir.path == *path) {
                continue;
            }
            let directory = match scan_directory(&pattern, path).await {
                Ok(directory) => directory,
                Err(e) => {
                    warn!(path = %path, error = %e, "Cannot scan plot directory");
                    PlotDirectory::empty(path.clone())
                }
            };
            directories.push(directory);
        }

        Ok(Self {
            pattern,
            directories: RwLock::new(directories),
            stopping: AtomicBool::new(false),
        })
    }

    /// Whether `name` looks like a plot file
    pub fn is_plot_file_name(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> AppResult<()> {
        if self.is_stopping() {
            return Err(AppError::ShuttingDown);
        }
        Ok(())
    }
}

#[async_trait]
impl NodeServer for PlotStore {
    async fn plot_directories(&self) -> Vec<PlotDirectory> {
        self.directories.read().await.clone()
    }

    async fn rescan_plot_directories(&self) -> AppResult<PlotSummary> {
        self.ensure_running()?;

        let paths: Vec<String> = self
            .directories
            .read()
            .await
            .iter()
            .map(|dir| dir.path.clone())
            .collect();

        let mut scanned = Vec::with_capacity(paths.len());
        for path in paths {
            let directory = match scan_directory(&self.pattern, &path).await {
                Ok(directory) => directory,
                Err(e) => {
                    warn!(path = %path, error = %e, "Cannot scan plot directory");
                    PlotDirectory::empty(path)
                }
            };
            scanned.push(directory);
        }

        // Directories added or removed while scanning stay as they are now;
        // only entries still configured take the fresh counts.
        let mut directories = self.directories.write().await;
        for directory in directories.iter_mut() {
            if let Some(fresh) = scanned.iter().find(|fresh| fresh.path == directory.path) {
                *directory = fresh.clone();
            }
        }
        Ok(PlotSummary::from_directories(directories.clone()))
    }

    async fn add_plot_directory(&self, path: &str) -> AppResult<PlotDirectory> {
        self.ensure_running()?;
        if self.directories.read().await.iter().any(|dir| dir.path == path) {
            return Err(AppError::Validation(format!("Plot directory already configured: {}", path)));
        }

        let directory = scan_directory(&self.pattern, path).await?;

        let mut directories = self.directories.write().await;
        // Another request may have added it while we were scanning.
        if directories.iter().any(|dir| dir.path == path) {
            return Err(AppError::Validation(format!("Plot directory already configured: {}", path)));
        }
        directories.push(directory.clone());
        Ok(directory)
    }

    async fn remove_plot_directory(&self, path: &str) -> AppResult<PlotDirectory> {
        let mut directories = self.directories.write().await;
        let index = directories
            .iter()
            .position(|dir| dir.path == path)
            .ok_or_else(|| AppError::PlotDirectory(format!("Not a configured plot directory: {}", path)))?;
        Ok(directories.remove(index))
    }

    fn request_shutdown(&self) {
        if !self.stopping.swap(true, Ordering::SeqCst) {
            info!("Plot store stopping");
        }
    }
}

/// Count plot files and their sizes in one directory (not recursive)
async fn scan_directory(pattern: &Regex, path: &str) -> AppResult<PlotDirectory> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| AppError::PlotDirectory(format!("{}: {}", path, e)))?;
    if !metadata.is_dir() {
        return Err(AppError::PlotDirectory(format!("Not a directory: {}", path)));
    }

    let mut entries = tokio::fs::read_dir(Path::new(path)).await?;
    let mut directory = PlotDirectory::empty(path);

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !pattern.is_match(name) {
            continue;
        }

        let metadata = entry.metadata().await?;
        if metadata.is_file() {
            directory.plot_files += 1;
            directory.total_bytes += metadata.len();
        }
    }

    debug!(
        path = %path,
        plot_files = directory.plot_files,
        total_bytes = directory.total_bytes,
        "Plot directory scanned"
    );
    Ok(directory)
}
