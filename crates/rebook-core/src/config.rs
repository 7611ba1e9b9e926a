use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "rebook.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebookConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub rebooking: RebookingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Staging store with the raw vendor extracts.
    #[serde(default = "default_source_path")]
    pub path: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: default_source_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
    /// Records per sink transaction.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Used when `--days-back` is not given.
    #[serde(default = "default_days_back")]
    pub days_back: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            days_back: default_days_back(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebookingConfig {
    /// Shared accounts (walk-in, cash sale) that are never rebooked or new.
    #[serde(default)]
    pub walk_in_client_ids: Vec<String>,
}

impl RebookConfig {
    /// Reject values that parse but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.output.batch_size == 0 {
            bail!("output.batch_size must be at least 1");
        }
        if self.source.path.as_os_str().is_empty() {
            bail!("source.path must not be empty");
        }
        if self.output.path.as_os_str().is_empty() {
            bail!("output.path must not be empty");
        }
        Ok(())
    }
}

/// Load config from `path`, or defaults when the file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read, parsed or
/// validated.
pub fn load_config(path: &Path) -> Result<RebookConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(RebookConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<RebookConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config in {}", path.display()))?;
    Ok(config)
}

fn default_source_path() -> PathBuf {
    PathBuf::from("staging.sqlite3")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("rebook.sqlite3")
}

const fn default_batch_size() -> usize {
    500
}

const fn default_days_back() -> u32 {
    10
}
