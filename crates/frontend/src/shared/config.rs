//! Client configuration
//!
//! The browser build uses the embedded defaults (optionally overridden from a
//! TOML string served with the app); native tools may load a `client.toml`.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default configuration embedded in the binary
pub const DEFAULT_CONFIG: &str = r#"
[api]
base_url = ""
prefix = "/api"
default_timeout_ms = 30000
fast_timeout_ms = 5000

[feature_gates]
remote_path = "/api/ops/feature-gates"
fallback_path = "/feature-gates.json"

[health]
path = "/api/ops/health"
attempts = 3
retry_delay_ms = 2000
"#;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub feature_gates: FeatureGatesSettings,
    pub health: HealthSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiConfig {
    /// Empty: derive from the page location (browser) or use relative URLs
    #[serde(default)]
    pub base_url: String,
    pub prefix: String,
    pub default_timeout_ms: u64,
    /// Timeout for health-style probes
    pub fast_timeout_ms: u64,
    /// Reject malformed API paths before sending. Defaults to on in debug
    /// builds only.
    #[serde(default = "strict_paths_default")]
    pub strict_paths: bool,
}

fn strict_paths_default() -> bool {
    cfg!(debug_assertions)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeatureGatesSettings {
    pub remote_path: String,
    /// Static asset, outside the API prefix
    pub fallback_path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthSettings {
    pub path: String,
    pub attempts: u32,
    pub retry_delay_ms: u64,
}

impl ApiConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn fast_timeout(&self) -> Duration {
        Duration::from_millis(self.fast_timeout_ms)
    }
}

impl HealthSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_toml_str(DEFAULT_CONFIG).unwrap_or_else(|e| {
            log::error!("embedded config is invalid: {}", e);
            Self::fallback()
        })
    }
}

impl ClientConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let prefix = &self.api.prefix;
        if !prefix.starts_with('/') || prefix.ends_with('/') {
            return Err(ConfigError::Invalid(format!(
                "api.prefix must start and not end with '/': {:?}",
                prefix
            )));
        }
        if self.api.default_timeout_ms == 0 || self.api.fast_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be positive".into()));
        }
        if self.health.attempts == 0 {
            return Err(ConfigError::Invalid("health.attempts must be at least 1".into()));
        }
        Ok(())
    }

    fn fallback() -> Self {
        Self {
            api: ApiConfig {
                base_url: String::new(),
                prefix: "/api".into(),
                default_timeout_ms: 30_000,
                fast_timeout_ms: 5_000,
                strict_paths: strict_paths_default(),
            },
            feature_gates: FeatureGatesSettings {
                remote_path: "/api/ops/feature-gates".into(),
                fallback_path: "/feature-gates.json".into(),
            },
            health: HealthSettings {
                path: "/api/ops/health".into(),
                attempts: 3,
                retry_delay_ms: 2_000,
            },
        }
    }
}

/// Load configuration from a TOML file, falling back to the embedded default
/// when the file does not exist.
#[cfg(not(target_arch = "wasm32"))]
pub fn load_config(path: &std::path::Path) -> Result<ClientConfig, ConfigError> {
    if path.exists() {
        log::info!("Loading client config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        return ClientConfig::from_toml_str(&contents);
    }

    log::warn!("{} not found, using embedded configuration", path.display());
    ClientConfig::from_toml_str(DEFAULT_CONFIG)
}
