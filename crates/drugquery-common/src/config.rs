//! Configuration loading for DrugQuery.
//! Reads drugquery.toml from the current directory or the path in DRUGQUERY_CONFIG.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DrugQueryError, Result};

pub const CONFIG_ENV_VAR: &str = "DRUGQUERY_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "drugquery.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scores: ScoresConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

/// Where artifacts live. All entity file paths are relative to `media_root`;
/// export working directories and archives go under `tmp_root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
    #[serde(default = "default_tmp_root")]
    pub tmp_root: PathBuf,
}

fn default_media_root() -> PathBuf { PathBuf::from("./media") }
fn default_tmp_root()   -> PathBuf { PathBuf::from("./tmp") }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            media_root: default_media_root(),
            tmp_root: default_tmp_root(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoresConfig {
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

fn default_max_rows() -> usize { 100 }

impl Default for ScoresConfig {
    fn default() -> Self {
        Self { max_rows: default_max_rows() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_radius")]
    pub fingerprint_radius: usize,
    #[serde(default = "default_nbits")]
    pub fingerprint_bits: usize,
    /// Hits below this Tanimoto coefficient are dropped.
    #[serde(default)]
    pub min_similarity: f64,
    #[serde(default)]
    pub max_results: Option<usize>,
}

fn default_radius() -> usize { 2 }
fn default_nbits()  -> usize { 2048 }

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fingerprint_radius: default_radius(),
            fingerprint_bits: default_nbits(),
            min_similarity: 0.0,
            max_results: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// N used by the "top dockings" download.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

fn default_top_n()            -> usize  { 100 }
fn default_timestamp_format() -> String { "%Y-%m-%d__%H.%M.%S".to_string() }

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            timestamp_format: default_timestamp_format(),
        }
    }
}

impl ExportConfig {
    /// Render `time` with `timestamp_format`. The result becomes part of a
    /// directory name, so it must stay a single path component.
    pub fn stamp(&self, time: &DateTime<Local>) -> Result<String> {
        use std::fmt::Write as _;

        let format = &self.timestamp_format;
        let invalid = |why: &str| {
            DrugQueryError::Config(format!("export.timestamp_format {format:?} {why}"))
        };
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(invalid("is not a valid strftime layout"));
        }
        let mut stamp = String::new();
        write!(stamp, "{}", time.format(format)).map_err(|_| invalid("cannot be rendered"))?;
        if stamp.contains(['/', '\\']) {
            return Err(invalid("renders a path separator"));
        }
        Ok(stamp)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Contact recorded on re-dock jobs, which have no submitting user.
    #[serde(default = "default_redock_contact")]
    pub redock_contact: String,
}

fn default_redock_contact() -> String { "none@none.com".to_string() }

impl Default for JobsConfig {
    fn default() -> Self {
        Self { redock_contact: default_redock_contact() }
    }
}

impl Config {
    /// Load configuration from drugquery.toml.
    /// Checks DRUGQUERY_CONFIG env var first, then current directory.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_path(path)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DrugQueryError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| DrugQueryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make an operation meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.scores.max_rows == 0 {
            return Err(DrugQueryError::Config("scores.max_rows must be positive".into()));
        }
        if self.search.fingerprint_bits == 0 {
            return Err(DrugQueryError::Config("search.fingerprint_bits must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.search.min_similarity) {
            return Err(DrugQueryError::Config(
                "search.min_similarity must be within [0, 1]".into(),
            ));
        }
        if self.export.top_n == 0 {
            return Err(DrugQueryError::Config("export.top_n must be positive".into()));
        }
        self.export.stamp(&Local::now())?;
        Ok(())
    }
}
