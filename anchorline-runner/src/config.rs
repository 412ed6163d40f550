//! Run configuration.
//!
//! Resolution order: built-in defaults, then an optional TOML file, then
//! `ANCHORLINE_*` environment variables. CLI flags are applied last by the
//! binary. The resolved value is passed explicitly to the store and the
//! orchestrator.

use std::env;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Start of the historical backfill when nothing else is configured.
pub const DEFAULT_START_DATE: (i32, u32, u32) = (2019, 10, 1);
/// Reference instrument for zone classification.
pub const DEFAULT_REFERENCE_SYMBOL: &str = "SPY";
/// SQLite file used when no path is configured.
pub const DEFAULT_DB_PATH: &str = "anchorline.db";

pub const ENV_DB: &str = "ANCHORLINE_DB";
pub const ENV_START_DATE: &str = "ANCHORLINE_START_DATE";
pub const ENV_END_DATE: &str = "ANCHORLINE_END_DATE";
pub const ENV_LIMIT: &str = "ANCHORLINE_LIMIT";
pub const ENV_REFERENCE: &str = "ANCHORLINE_REFERENCE";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid date '{value}' for {field} (expected YYYY-MM-DD)")]
    InvalidDate { field: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Replay window and instrument selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    pub start_date: NaiveDate,
    /// Inclusive upper bound; `None` means up to the latest stored bar.
    pub end_date: Option<NaiveDate>,
    /// Upper bound on the number of instruments replayed.
    pub limit: Option<usize>,
    pub reference_symbol: String,
}

impl Default for RunSection {
    fn default() -> Self {
        let (y, m, d) = DEFAULT_START_DATE;
        Self {
            start_date: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
            end_date: None,
            limit: None,
            reference_symbol: DEFAULT_REFERENCE_SYMBOL.to_string(),
        }
    }
}

/// Storage connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

/// Complete configuration for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub run: RunSection,
    pub store: StoreConfig,
}

impl RunConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, optionally overlaid with a TOML file, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay `ANCHORLINE_*` variables that are set and non-empty.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| {
            env::var(name)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
    }

    /// Overlay values from an arbitrary lookup keyed by variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB) {
            self.store.path = PathBuf::from(path);
        }
        if let Some(raw) = lookup(ENV_START_DATE) {
            self.run.start_date = parse_date(ENV_START_DATE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_END_DATE) {
            self.run.end_date = Some(parse_date(ENV_END_DATE, &raw)?);
        }
        if let Some(raw) = lookup(ENV_LIMIT) {
            let limit = raw
                .parse::<usize>()
                .map_err(|e| ConfigError::Invalid(format!("{ENV_LIMIT}='{raw}': {e}")))?;
            self.run.limit = Some(limit);
        }
        if let Some(symbol) = lookup(ENV_REFERENCE) {
            self.run.reference_symbol = symbol;
        }
        self.validate()
    }

    /// Cross-field checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(end) = self.run.end_date {
            if end < self.run.start_date {
                return Err(ConfigError::Invalid(format!(
                    "end_date {end} is before start_date {}",
                    self.run.start_date
                )));
            }
        }
        if self.run.reference_symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("reference_symbol is empty".into()));
        }
        if self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("store.path is empty".into()));
        }
        Ok(())
    }
}

/// Parse a `YYYY-MM-DD` date, naming the offending field on failure.
pub fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| ConfigError::InvalidDate {
        field,
        value: raw.to_string(),
    })
}
