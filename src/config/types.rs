use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the MindForge client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MindForgeConfig {
    /// Remote API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the brainstorm API, including the `/api` prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Connect timeout in seconds. No overall request timeout is applied
    /// because the message endpoint streams for as long as the model runs.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter string applied before RUST_LOG, e.g. "mindforge_client=debug"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000/api".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl MindForgeConfig {
    /// Path of the application configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mindforge")
            .join("mindforge_config.json")
    }
}
