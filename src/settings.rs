use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};
use crate::occurrence::ShortMonthPolicy;

/// Overrides the directory holding `settings.json`.
pub const CONFIG_DIR_ENV: &str = "ROLLFORWARD_CONFIG_DIR";

const DEFAULT_LOG_FILTER: &str = "rollforward=info";
const MIN_INTERVAL_SECS: u64 = 1;
const MAX_LOOKAHEAD_MONTHS: u32 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_owner_id")]
    pub owner_id: i64,
    #[serde(default)]
    pub short_month_policy: ShortMonthPolicy,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    #[serde(default = "default_sync_lookahead_months")]
    pub sync_lookahead_months: u32,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_owner_id() -> i64 {
    1
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

fn default_sync_interval_secs() -> u64 {
    6 * 3600
}

fn default_sync_lookahead_months() -> u32 {
    1
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            owner_id: default_owner_id(),
            short_month_policy: ShortMonthPolicy::default(),
            sweep_interval_secs: default_sweep_interval_secs(),
            sync_interval_secs: default_sync_interval_secs(),
            sync_lookahead_months: default_sync_lookahead_months(),
            log_filter: default_log_filter(),
        }
    }
}

impl Settings {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    /// Reject values the scheduler or logger cannot use.
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.trim().is_empty() {
            return Err(Error::Settings("data_dir is empty".to_string()));
        }
        if self.sweep_interval_secs < MIN_INTERVAL_SECS || self.sync_interval_secs < MIN_INTERVAL_SECS {
            return Err(Error::Settings("scheduler intervals must be at least 1 second".to_string()));
        }
        if self.sync_lookahead_months > MAX_LOOKAHEAD_MONTHS {
            return Err(Error::Settings(format!(
                "sync_lookahead_months {} exceeds {MAX_LOOKAHEAD_MONTHS}",
                self.sync_lookahead_months
            )));
        }
        EnvFilter::try_new(&self.log_filter)
            .map_err(|e| Error::Settings(format!("log_filter '{}': {e}", self.log_filter)))?;
        Ok(())
    }

    /// Clamp out-of-range values from a hand-edited file to usable ones.
    fn normalized(mut self) -> Self {
        self.sweep_interval_secs = self.sweep_interval_secs.max(MIN_INTERVAL_SECS);
        self.sync_interval_secs = self.sync_interval_secs.max(MIN_INTERVAL_SECS);
        self.sync_lookahead_months = self.sync_lookahead_months.min(MAX_LOOKAHEAD_MONTHS);
        if EnvFilter::try_new(&self.log_filter).is_err() {
            self.log_filter = default_log_filter();
        }
        self
    }
}

fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("rollforward")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("share")
        .join("rollforward")
}

/// Settings from `path`, normalized. A missing or unparsable file yields defaults.
pub fn load_from(path: &Path) -> Settings {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str::<Settings>(&content).ok())
        .unwrap_or_default()
        .normalized()
}

pub fn save_to(path: &Path, settings: &Settings) -> Result<()> {
    settings.validate()?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn load_settings() -> Settings {
    load_from(&config_dir().join("settings.json"))
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_to(&config_dir().join("settings.json"), settings)
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(&load_settings().data_dir)
}

/// Expand a leading `~` and anchor relative paths at the working directory.
pub fn expand_data_dir(raw: &str) -> PathBuf {
    let path = match raw.strip_prefix('~') {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches('/')),
            None => PathBuf::from(raw),
        },
        None => PathBuf::from(raw),
    };
    if path.is_absolute() {
        path
    } else {
        std::env::current_dir().map(|cwd| cwd.join(&path)).unwrap_or(path)
    }
}
