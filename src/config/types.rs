//! Struct definitions and serde defaults for deltactl configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for deltactl, deserialized from `config.toml`.
///
/// Fields use serde defaults so deltactl can run against a default local
/// Delta stack when no config file exists.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Origin of the inference server (e.g. `"http://localhost:8080"`).
    #[serde(default = "default_server_origin")]
    pub server_origin: String,
    /// Explicit model management API base URL. When unset, the base is
    /// resolved from `server_origin` via the fixed-port convention.
    #[serde(default)]
    pub model_api_url: Option<String>,
    /// API key sent as a bearer token to the inference server.
    /// Can also be set via the `DELTA_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Display options for generation statistics.
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Display options for the generation-stats views (`watch`, `status`).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DisplayConfig {
    /// Whether to include a tokens/s figure in generation detail lines.
    #[serde(default = "default_true")]
    pub show_tokens_per_second: bool,
    /// Whether the last known stats stay visible after monitoring stops.
    #[serde(default)]
    pub keep_stats_visible: bool,
}

/// Returns the default inference server origin.
///
/// Used by serde's `#[serde(default)]` attribute during deserialization.
pub(super) fn default_server_origin() -> String {
    crate::constants::DEFAULT_SERVER_ORIGIN.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_tokens_per_second: true,
            keep_stats_visible: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_origin: default_server_origin(),
            model_api_url: None,
            api_key: None,
            display: DisplayConfig::default(),
        }
    }
}

impl Config {
    /// Returns the API key from the config file or the environment.
    /// Config wins when both are present.
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(crate::constants::API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }
}
