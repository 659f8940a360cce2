//! Agent identity types
//!
//! The identity is built once from configuration and never re-derived, so
//! registration and every later heartbeat address the same backend device
//! record.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::AgentConfig;
use crate::error::ConfigError;

/// Unique identifier for the device this agent fronts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Create a device ID from an explicit string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive a stable device ID from the host name and automation port.
    ///
    /// The same host and port always produce the same ID, keeping the
    /// backend record stable across agent restarts.
    pub fn derive(hostname: &str, port: u16) -> Self {
        let digest = Sha256::digest(format!("{}:{}", hostname, port).as_bytes());
        let id: String = hex::encode(digest).chars().take(16).collect();
        Self(id)
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Immutable identity the agent presents to the backend.
///
/// Built once at startup; there are no setters.
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    license_key: String,
    device_id: DeviceId,
    automation_server_port: u16,
}

impl AgentIdentity {
    /// Build the identity from configuration.
    ///
    /// Fails if the license key is empty. The device ID comes from the
    /// config when set, otherwise it is derived from the host name and
    /// the automation server port.
    pub fn from_config(config: &AgentConfig) -> Result<Self, ConfigError> {
        if config.license_key.trim().is_empty() {
            return Err(ConfigError::MissingField("license_key".to_string()));
        }

        let port = config.automation_server.port;
        let device_id = match &config.device_id {
            Some(id) if !id.trim().is_empty() => DeviceId::new(id.clone()),
            _ => {
                let hostname = gethostname::gethostname().to_string_lossy().into_owned();
                DeviceId::derive(&hostname, port)
            }
        };

        Ok(Self {
            license_key: config.license_key.clone(),
            device_id,
            automation_server_port: port,
        })
    }

    /// License key for the backend account
    pub fn license_key(&self) -> &str {
        &self.license_key
    }

    /// Identifier of the device this agent fronts
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Port the local automation server listens on
    pub fn automation_server_port(&self) -> u16 {
        self.automation_server_port
    }
}
