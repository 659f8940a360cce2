//! Configuration management for GridLink

mod agent;
pub mod serde_utils;

pub use agent::{
    AgentConfig, AutomationServerConfig, HeartbeatConfig, TunnelConfig, TunnelProviderConfig,
};

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ConfigError;

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gridlink")
}

/// Get the default configuration file path for the agent
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("agent.toml")
}

/// Load a configuration value from a TOML file
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read {}: {}", path.display(), e)))?;

    let config = toml::from_str(&content)?;
    Ok(config)
}

/// Save a configuration value to a TOML file, creating parent directories
pub fn save_config<T: Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ConfigError::Invalid(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write {}: {}", path.display(), e)))?;

    Ok(())
}
