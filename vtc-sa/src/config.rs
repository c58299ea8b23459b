//! Configuration resolution for vtc-sa
//!
//! Each value: command line → environment → TOML (`~/.config/vtc/vtc-sa.toml`)
//! → compiled default. See `vtc_common::config`.

use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use vtc_common::config::{default_database_path, resolve, resolve_key, TomlConfig};

/// Service name, also the TOML file stem
pub const SERVICE_NAME: &str = "vtc-sa";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5731;
pub const DEFAULT_ANALYSIS_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ANALYSIS_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_CONVERSATIONS_BASE_URL: &str = "https://api.elevenlabs.io";
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 5;
/// Transcripts shorter than this (in characters) get a mock analysis
pub const DEFAULT_MIN_TRANSCRIPT_CHARS: usize = 20;
pub const DEFAULT_ANALYSIS_QUEUE_CAPACITY: usize = 64;

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_path: Option<PathBuf>,
    pub internal_secret: Option<String>,
    pub analysis_api_key: Option<String>,
}

/// Qualitative-analysis provider settings
#[derive(Debug, Clone)]
pub struct AnalysisProviderConfig {
    /// `None` → provider unconfigured; every analysis uses the mock path
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

/// Conversation provider settings
#[derive(Debug, Clone)]
pub struct ConversationProviderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub internal_secret: Option<String>,
    pub analysis: AnalysisProviderConfig,
    pub conversations: ConversationProviderConfig,
    pub store_timeout: Duration,
    pub min_transcript_chars: usize,
    pub analysis_queue_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database_path: default_database_path(),
            internal_secret: None,
            analysis: AnalysisProviderConfig {
                api_key: None,
                base_url: DEFAULT_ANALYSIS_BASE_URL.to_string(),
                model: DEFAULT_ANALYSIS_MODEL.to_string(),
                timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
            },
            conversations: ConversationProviderConfig {
                api_key: None,
                base_url: DEFAULT_CONVERSATIONS_BASE_URL.to_string(),
            },
            store_timeout: Duration::from_secs(DEFAULT_STORE_TIMEOUT_SECS),
            min_transcript_chars: DEFAULT_MIN_TRANSCRIPT_CHARS,
            analysis_queue_capacity: DEFAULT_ANALYSIS_QUEUE_CAPACITY,
        }
    }
}

impl ServiceConfig {
    /// Resolve every value through the four tiers
    pub fn resolve(cli: CliOverrides, toml: TomlConfig) -> Self {
        let defaults = ServiceConfig::default();

        let analysis_timeout_secs = resolve(
            None,
            "VTC_ANALYSIS_TIMEOUT_SECS",
            toml.analysis.timeout_secs,
            DEFAULT_PROVIDER_TIMEOUT_SECS,
        );
        let store_timeout_secs = resolve(
            None,
            "VTC_STORE_TIMEOUT_SECS",
            toml.store_timeout_secs,
            DEFAULT_STORE_TIMEOUT_SECS,
        );

        let config = Self {
            host: resolve(cli.host, "VTC_SA_HOST", toml.host, defaults.host),
            port: resolve(cli.port, "VTC_SA_PORT", toml.port, defaults.port),
            database_path: resolve(
                cli.database_path,
                "VTC_DATABASE_PATH",
                toml.database_path,
                defaults.database_path,
            ),
            internal_secret: resolve_key(cli.internal_secret, "VTC_INTERNAL_SECRET", toml.internal_secret),
            analysis: AnalysisProviderConfig {
                api_key: resolve_key(cli.analysis_api_key, "VTC_ANALYSIS_API_KEY", toml.analysis.api_key),
                base_url: resolve(
                    None,
                    "VTC_ANALYSIS_BASE_URL",
                    toml.analysis.base_url,
                    defaults.analysis.base_url,
                ),
                model: resolve(None, "VTC_ANALYSIS_MODEL", toml.analysis.model, defaults.analysis.model),
                timeout: Duration::from_secs(analysis_timeout_secs),
            },
            conversations: ConversationProviderConfig {
                api_key: resolve_key(None, "VTC_CONVERSATIONS_API_KEY", toml.conversations.api_key),
                base_url: resolve(
                    None,
                    "VTC_CONVERSATIONS_BASE_URL",
                    toml.conversations.base_url,
                    defaults.conversations.base_url,
                ),
            },
            store_timeout: Duration::from_secs(store_timeout_secs),
            min_transcript_chars: resolve(
                None,
                "VTC_MIN_TRANSCRIPT_CHARS",
                toml.min_transcript_chars,
                DEFAULT_MIN_TRANSCRIPT_CHARS,
            ),
            analysis_queue_capacity: resolve(
                None,
                "VTC_ANALYSIS_QUEUE_CAPACITY",
                toml.analysis_queue_capacity,
                DEFAULT_ANALYSIS_QUEUE_CAPACITY,
            )
            .max(1),
        };

        config.log_summary();
        config
    }

    /// Socket address string for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn log_summary(&self) {
        if self.analysis.api_key.is_some() {
            info!(
                model = %self.analysis.model,
                base_url = %self.analysis.base_url,
                "Analysis provider configured"
            );
        } else {
            warn!("Analysis provider not configured; all analyses will use mock output");
        }

        if self.conversations.api_key.is_none() {
            warn!("Conversation provider not configured; conv_ sessions cannot be fetched");
        }

        if self.internal_secret.is_none() {
            info!("No internal secret configured; trusted-caller credential disabled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vtc_common::config::AnalysisProviderToml;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.min_transcript_chars, 20);
        assert!(config.analysis.api_key.is_none());
        assert_eq!(config.bind_addr(), "127.0.0.1:5731");
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml = TomlConfig {
            port: Some(6001),
            analysis: AnalysisProviderToml {
                api_key: Some("from-toml".into()),
                model: Some("custom-model".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let cli = CliOverrides {
            port: Some(7001),
            analysis_api_key: Some("from-cli".into()),
            ..Default::default()
        };

        let config = ServiceConfig::resolve(cli, toml);

        assert_eq!(config.port, 7001);
        assert_eq!(config.analysis.api_key.as_deref(), Some("from-cli"));
        assert_eq!(config.analysis.model, "custom-model");
    }

    #[test]
    fn test_queue_capacity_never_zero() {
        let toml = TomlConfig {
            analysis_queue_capacity: Some(0),
            ..Default::default()
        };
        let config = ServiceConfig::resolve(CliOverrides::default(), toml);
        assert_eq!(config.analysis_queue_capacity, 1);
    }
}
