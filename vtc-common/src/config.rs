//! Configuration loading and value resolution
//!
//! Every configurable value is resolved with the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: services start on defaults and log a
//! warning. A malformed TOML file is reported as `Error::Config`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Configuration directory name under the platform config dir
const CONFIG_DIR_NAME: &str = "vtc";

/// TOML configuration file contents
///
/// All fields are optional; absent values fall through to compiled defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_path: Option<PathBuf>,
    /// Server-to-server secret accepted in place of an end-user credential
    pub internal_secret: Option<String>,
    pub store_timeout_secs: Option<u64>,
    pub min_transcript_chars: Option<usize>,
    pub analysis_queue_capacity: Option<usize>,
    #[serde(default)]
    pub analysis: AnalysisProviderToml,
    #[serde(default)]
    pub conversations: ConversationProviderToml,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[analysis]` table: qualitative-analysis provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisProviderToml {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// `[conversations]` table: third-party conversation provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationProviderToml {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// `[logging]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
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
    "info".to_string()
}

/// Default TOML path for a service: `<config_dir>/vtc/<service>.toml`
pub fn default_config_path(service_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(format!("{}.toml", service_name)))
}

/// Default database location: `<data_local_dir>/vtc/vtc.db`
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(CONFIG_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./vtc_data"))
        .join("vtc.db")
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Load the TOML config if present, otherwise return defaults
///
/// Missing file → warning + defaults. Unreadable or malformed file → error.
pub fn load_or_default(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        warn!("No config directory available on this platform, using defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!("Config file not found at {}, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let config = load_toml_config(path)?;
    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Resolve one value through the four tiers
///
/// Environment values that fail to parse are ignored with a warning and
/// resolution continues with the next tier.
pub fn resolve<T>(cli: Option<T>, env_var: &str, toml_value: Option<T>, default: T) -> T
where
    T: FromStr,
{
    if let Some(value) = cli {
        return value;
    }

    if let Ok(raw) = std::env::var(env_var) {
        match raw.parse::<T>() {
            Ok(value) => return value,
            Err(_) => warn!("Ignoring unparseable value in {}", env_var),
        }
    }

    toml_value.unwrap_or(default)
}

/// Resolve an optional secret/key through the first three tiers
///
/// Blank values count as absent at every tier.
pub fn resolve_key(cli: Option<String>, env_var: &str, toml_value: Option<String>) -> Option<String> {
    cli.filter(|k| is_valid_key(k))
        .or_else(|| std::env::var(env_var).ok().filter(|k| is_valid_key(k)))
        .or_else(|| toml_value.filter(|k| is_valid_key(k)))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
