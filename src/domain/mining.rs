//! Mining domain models
//!
//! Mining info, nonce submissions, miner settings and plot storage as seen by
//! the web layer. `MiningInfo` serializes in the Burst wire shape so it can be
//! handed to miners unchanged.

use crate::config::app_config::MinerConfig;
use crate::shared::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Current block parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "MiningInfoWire", try_from = "MiningInfoWire")]
pub struct MiningInfo {
    /// Block height being mined
    pub height: u64,

    /// Base target of the block
    pub base_target: u64,

    /// Generation signature (hex)
    pub generation_signature: String,

    /// Deadlines above this many seconds are not worth submitting (0 = unlimited)
    pub target_deadline: u64,
}

/// Pools disagree on whether numbers are quoted; accept both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

impl NumberOrString {
    fn into_u64(self, field: &str) -> AppResult<u64> {
        match self {
            NumberOrString::Number(value) => Ok(value),
            NumberOrString::String(value) => value
                .trim()
                .parse()
                .map_err(|_| AppError::Validation(format!("{} is not a number: {}", field, value))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MiningInfoWire {
    height: NumberOrString,
    base_target: NumberOrString,
    generation_signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_deadline: Option<NumberOrString>,
}

impl From<MiningInfo> for MiningInfoWire {
    fn from(info: MiningInfo) -> Self {
        Self {
            height: NumberOrString::String(info.height.to_string()),
            base_target: NumberOrString::String(info.base_target.to_string()),
            generation_signature: info.generation_signature,
            target_deadline: Some(NumberOrString::Number(info.target_deadline)),
        }
    }
}

impl TryFrom<MiningInfoWire> for MiningInfo {
    type Error = AppError;

    fn try_from(wire: MiningInfoWire) -> AppResult<Self> {
        Ok(Self {
            height: wire.height.into_u64("height")?,
            base_target: wire.base_target.into_u64("baseTarget")?,
            generation_signature: wire.generation_signature,
            target_deadline: match wire.target_deadline {
                Some(value) => value.into_u64("targetDeadline")?,
                None => 0,
            },
        })
    }
}

impl MiningInfo {
    /// Combine the pool's target deadline with the locally configured one
    pub fn with_local_target_deadline(mut self, local: u64) -> Self {
        self.target_deadline = match self.target_deadline {
            0 => local,
            pool => pool.min(local),
        };
        self
    }
}

/// A nonce submitted by a miner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceSubmission {
    pub account_id: u64,
    pub nonce: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<u64>,
}

impl NonceSubmission {
    /// Parse the raw protocol parameters of a `submitNonce` request
    pub fn parse(account_id: Option<&str>, nonce: Option<&str>, deadline: Option<&str>) -> AppResult<Self> {
        let account_id = parse_required(account_id, "accountId")?;
        let nonce = parse_required(nonce, "nonce")?;
        let deadline = match deadline.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => Some(
                value
                    .parse()
                    .map_err(|_| AppError::Validation(format!("deadline is not a number: {}", value)))?,
            ),
            None => None,
        };

        Ok(Self { account_id, nonce, deadline })
    }
}

fn parse_required(value: Option<&str>, field: &str) -> AppResult<u64> {
    let value = value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{} is required", field)))?;
    value
        .parse()
        .map_err(|_| AppError::Validation(format!("{} is not a number: {}", field, value)))
}

/// Settings the miner is currently running with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerSettings {
    pub target_deadline: u64,
    pub mining_intensity: u32,
    pub max_plot_readers: u32,
    pub buffer_size_mb: u64,
    pub submission_max_retry: u32,
}

impl From<&MinerConfig> for MinerSettings {
    fn from(config: &MinerConfig) -> Self {
        Self {
            target_deadline: config.target_deadline,
            mining_intensity: config.mining_intensity,
            max_plot_readers: config.max_plot_readers,
            buffer_size_mb: config.buffer_size_mb,
            submission_max_retry: config.submission_max_retry,
        }
    }
}

/// A partial settings change posted by an operator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SettingsUpdate {
    #[validate(range(min = 1))]
    pub target_deadline: Option<u64>,

    #[validate(range(max = 1024))]
    pub mining_intensity: Option<u32>,

    #[validate(range(max = 1024))]
    pub max_plot_readers: Option<u32>,

    #[validate(range(min = 1, max = 65536))]
    pub buffer_size_mb: Option<u64>,

    #[validate(range(max = 100))]
    pub submission_max_retry: Option<u32>,
}

impl SettingsUpdate {
    /// Parse and validate a posted JSON body
    pub fn from_json(body: &[u8]) -> AppResult<Self> {
        let update: SettingsUpdate = serde_json::from_slice(body)?;
        update.validate()?;
        if update.is_empty() {
            return Err(AppError::Validation("No settings to change".to_string()));
        }
        Ok(update)
    }

    /// True when the update changes nothing
    pub fn is_empty(&self) -> bool {
        *self == SettingsUpdate::default()
    }

    /// Apply every present field onto `settings`
    pub fn apply_to(&self, settings: &mut MinerSettings) {
        if let Some(value) = self.target_deadline {
            settings.target_deadline = value;
        }
        if let Some(value) = self.mining_intensity {
            settings.mining_intensity = value;
        }
        if let Some(value) = self.max_plot_readers {
            settings.max_plot_readers = value;
        }
        if let Some(value) = self.buffer_size_mb {
            settings.buffer_size_mb = value;
        }
        if let Some(value) = self.submission_max_retry {
            settings.submission_max_retry = value;
        }
    }
}

/// A configured plot directory and what was found in it on the last scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotDirectory {
    pub path: String,
    pub plot_files: usize,
    pub total_bytes: u64,
}

impl PlotDirectory {
    pub fn empty(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            plot_files: 0,
            total_bytes: 0,
        }
    }
}

/// Result of a rescan over every configured plot directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotSummary {
    pub directories: Vec<PlotDirectory>,
    pub plot_files: usize,
    pub total_bytes: u64,
}

impl PlotSummary {
    pub fn from_directories(directories: Vec<PlotDirectory>) -> Self {
        let plot_files = directories.iter().map(|dir| dir.plot_files).sum();
        let total_bytes = directories.iter().map(|dir| dir.total_bytes).sum();
        Self {
            directories,
            plot_files,
            total_bytes,
        }
    }
}

/// Configuration view pushed to dashboards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfigSnapshot {
    pub version: String,
    /// Block currently mined, if the pool has answered yet
    pub mining_info: Option<MiningInfo>,
    pub pool_url: String,
    pub settings: MinerSettings,
    pub plot_dirs: Vec<PlotDirectory>,
    pub total_plot_bytes: u64,
    pub websocket_requires_auth: bool,
}

/// Format a byte count the way dashboards display plot capacity
pub fn format_capacity(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}
