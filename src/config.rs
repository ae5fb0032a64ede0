//! Rasterizer configuration.
//!
//! Loaded from an optional `config.toml` in the project directory and merged
//! over stock defaults, so a config file only needs the keys it changes.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [tool]
//! binary = "inkscape"        # Name on PATH, or an absolute path
//! exchange = "auto"          # auto | stream | staged
//! stream_form = "file-flag"  # file-flag (-f - -e -) | positional (-e - -)
//!
//! [staging]
//! temp_dir = ""              # Where staged temp files go ("" = system temp)
//! prefix = "svg-raster"      # Temp file name prefix
//!
//! [processing]
//! max_processes = 4          # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RasterConfig {
    /// External tool and how to talk to it.
    pub tool: ToolConfig,
    /// Temp file placement for the staged exchange.
    pub staging: StagingConfig,
    /// Parallel processing settings for batch builds.
    pub processing: ProcessingConfig,
}

impl RasterConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tool.binary.trim().is_empty() {
            return Err(ConfigError::Validation(
                "tool.binary must not be empty".into(),
            ));
        }
        if self.staging.prefix.is_empty() {
            return Err(ConfigError::Validation(
                "staging.prefix must not be empty".into(),
            ));
        }
        if self.staging.prefix.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "staging.prefix must not contain path separators".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// How the input and output payloads are exchanged with the tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    /// Probe the tool version once and pick.
    #[default]
    Auto,
    /// Pipe SVG into stdin, read PNG from stdout.
    Stream,
    /// Go through temp files on disk.
    Staged,
}

/// Which `-` sentinel convention the streaming exchange uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamForm {
    /// `-f - -e -`
    #[default]
    FileFlag,
    /// `-e - -`
    Positional,
}

/// External tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Binary name looked up on `PATH`, or an absolute path.
    pub binary: String,
    pub exchange: ExchangeKind,
    pub stream_form: StreamForm,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            binary: "inkscape".to_string(),
            exchange: ExchangeKind::Auto,
            stream_form: StreamForm::FileFlag,
        }
    }
}

/// Temp file settings for the staged exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StagingConfig {
    /// Directory for temp files. Empty means the system temp directory.
    pub temp_dir: String,
    /// File name prefix, e.g. `svg-raster` → `svg-raster-in1a2b3c.svg`.
    pub prefix: String,
}

impl StagingConfig {
    /// Resolved temp directory.
    pub fn dir(&self) -> PathBuf {
        if self.temp_dir.is_empty() {
            std::env::temp_dir()
        } else {
            PathBuf::from(&self.temp_dir)
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            temp_dir: String::new(),
            prefix: "svg-raster".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel conversions.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(RasterConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<RasterConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: RasterConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
pub fn load_config(dir: &Path) -> Result<RasterConfig, ConfigError> {
    resolve_config(load_raw_config(dir)?)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# svg-raster configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# External rasterizer
# ---------------------------------------------------------------------------
[tool]
# Binary looked up on PATH, or an absolute path to it. When it cannot be
# found, conversions report "feature not available" and `build` falls back
# to pre-built assets.
binary = "inkscape"

# How SVG/PNG bytes are exchanged with the tool:
#   auto   - probe `<binary> --version` once; 0.x streams, 1.x+ uses files
#   stream - pipe SVG to stdin, read PNG from stdout
#   staged - write temp files and pass their paths
exchange = "auto"

# Streaming argument convention:
#   file-flag  - `-f - -e -`
#   positional - `-e - -`
stream_form = "file-flag"

# ---------------------------------------------------------------------------
# Staged exchange temp files
# ---------------------------------------------------------------------------
[staging]
# Directory for temp files ("" = system temp directory).
temp_dir = ""

# Temp file name prefix. Must not contain path separators.
prefix = "svg-raster"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel conversions. Omit to use all CPU cores.
# max_processes = 4
"##
}
