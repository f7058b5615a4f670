use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::types::MindForgeConfig;

/// Environment variable that overrides the configured API base URL.
pub const API_URL_ENV: &str = "MINDFORGE_API_URL";

/// Load configuration from the default location, applying the environment
/// override afterward.
pub fn load_config() -> Result<MindForgeConfig> {
    let mut config = load_config_from_path(MindForgeConfig::config_path())?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Load configuration from a specific path. A missing file yields the
/// default configuration, not an error.
pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> Result<MindForgeConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Ok(MindForgeConfig::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: MindForgeConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Save configuration to a specific path, creating parent directories.
pub fn save_config_to_path<P: AsRef<Path>>(config: &MindForgeConfig, path: P) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }

    let content =
        serde_json::to_string_pretty(config).context("Failed to serialize config to JSON")?;

    fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    Ok(())
}

fn apply_env_overrides(config: &mut MindForgeConfig) {
    if let Ok(url) = std::env::var(API_URL_ENV) {
        if !url.trim().is_empty() {
            log::debug!("overriding api.base_url from {API_URL_ENV}");
            config.api.base_url = url;
        }
    }
}
