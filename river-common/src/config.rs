//! Configuration file loading and compiled defaults
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Tiers 1 and 2 are handled by each binary's argument parser; this module
//! supplies tiers 3 and 4.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 21313;

/// Default bind address (all interfaces)
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Default password file, relative to the working directory
pub const DEFAULT_PASSWORD_FILE: &str = ".password";

/// Default data directory holding the index snapshot and artifact cache
pub const DEFAULT_DATA_DIR: &str = ".";

/// Default log level when neither `RUST_LOG` nor the TOML file sets one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Logging section of the TOML file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Contents of `config.toml`
///
/// Every field is optional; absent fields fall back to compiled defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Library root directory
    pub library: Option<PathBuf>,
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub password_file: Option<PathBuf>,
    /// Directory holding `.db.json` and `.stream/`
    pub data_dir: Option<PathBuf>,
    /// Explicit probe executable (skips ffprobe/avprobe resolution)
    pub probe_tool: Option<PathBuf>,
    /// Explicit transcode executable (skips ffmpeg/avconv resolution)
    pub transcode_tool: Option<PathBuf>,
    /// Maximum concurrent probe subprocesses during a reload
    pub probe_concurrency: Option<usize>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Candidate config file locations, most specific first
pub fn config_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("river").join("config.toml"));
    }
    if cfg!(unix) {
        candidates.push(PathBuf::from("/etc/river/config.toml"));
    }
    candidates
}

/// Load the TOML config
///
/// An explicit path must exist. Without one, the first existing candidate from
/// [`config_file_candidates`] is used; if none exists the defaults are returned.
/// A file that exists but fails to parse is always an error.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match config_file_candidates().into_iter().find(|p| p.exists()) {
            Some(path) => path,
            None => {
                debug!("No config file found, using compiled defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let config = read_toml_config(&path)?;
    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Parse a TOML config file at a known path
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Default number of concurrent probes: one per available core
pub fn default_probe_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
