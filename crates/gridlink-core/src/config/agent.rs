//! Agent configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::serde_utils::duration_secs;

/// Configuration for the bridge agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the GridLink backend
    pub backend_url: String,

    /// License key identifying the account (required)
    pub license_key: String,

    /// Device identifier override. Derived from the host name and the
    /// automation server port when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    /// Local automation server settings
    pub automation_server: AutomationServerConfig,

    /// Tunnel provider settings
    pub tunnel: TunnelConfig,

    /// Heartbeat settings
    pub heartbeat: HeartbeatConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            backend_url: "https://api.gridlink.dev".to_string(),
            license_key: String::new(),
            device_id: None,
            automation_server: AutomationServerConfig::default(),
            tunnel: TunnelConfig::default(),
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

/// Configuration for the local automation server child process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationServerConfig {
    /// Executable to launch
    pub command: String,

    /// Arguments; `{port}` expands to the configured port
    pub args: Vec<String>,

    /// Port the server listens on
    pub port: u16,

    /// Substring of an output line that signals the server is ready
    pub ready_pattern: String,

    /// How long to wait for the readiness line
    #[serde(with = "duration_secs")]
    pub startup_timeout: Duration,
}

impl Default for AutomationServerConfig {
    fn default() -> Self {
        Self {
            command: "appium".to_string(),
            args: vec![
                "--port".to_string(),
                "{port}".to_string(),
                "--relaxed-security".to_string(),
                "--allow-cors".to_string(),
            ],
            port: 4723,
            ready_pattern: "Appium REST http interface listener started".to_string(),
            startup_timeout: Duration::from_secs(30),
        }
    }
}

impl AutomationServerConfig {
    /// Arguments with the `{port}` placeholder expanded
    pub fn expanded_args(&self) -> Vec<String> {
        expand_port(&self.args, self.port)
    }
}

/// One tunnel provider invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelProviderConfig {
    /// Executable to launch
    pub command: String,

    /// Arguments; `{port}` expands to the automation server port
    pub args: Vec<String>,

    /// Domain suffix identifying this provider's public URLs
    pub url_suffix: String,
}

impl TunnelProviderConfig {
    /// Arguments with the `{port}` placeholder expanded
    pub fn expanded_args(&self, port: u16) -> Vec<String> {
        expand_port(&self.args, port)
    }
}

/// Tunnel negotiation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// How long each provider may take to print its URL
    #[serde(with = "duration_secs")]
    pub startup_timeout: Duration,

    /// Passes over the provider list before giving up
    pub rounds: u32,

    /// Pause between passes
    #[serde(with = "duration_secs")]
    pub round_delay: Duration,

    /// Provider tried first
    pub primary: TunnelProviderConfig,

    /// Provider tried when the primary fails
    pub fallback: TunnelProviderConfig,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(30),
            rounds: 1,
            round_delay: Duration::from_secs(2),
            primary: TunnelProviderConfig {
                command: "lt".to_string(),
                args: vec!["--port".to_string(), "{port}".to_string()],
                url_suffix: "loca.lt".to_string(),
            },
            fallback: TunnelProviderConfig {
                command: "cloudflared".to_string(),
                args: vec![
                    "tunnel".to_string(),
                    "--url".to_string(),
                    "http://localhost:{port}".to_string(),
                ],
                url_suffix: "trycloudflare.com".to_string(),
            },
        }
    }
}

/// Heartbeat loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Interval between heartbeats
    #[serde(with = "duration_secs")]
    pub interval: Duration,

    /// Per-request timeout for backend calls
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
        }
    }
}

fn expand_port(args: &[String], port: u16) -> Vec<String> {
    let port = port.to_string();
    args.iter().map(|a| a.replace("{port}", &port)).collect()
}
