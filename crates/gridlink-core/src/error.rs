//! Core error types for GridLink

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the GridLink agent
#[derive(Error, Debug)]
pub enum GridLinkError {
    /// Child process error
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    /// Tunnel negotiation error
    #[error("Tunnel error: {0}")]
    Tunnel(#[from] TunnelError),

    /// Backend API error
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from supervising a child process
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The executable could not be launched
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The process never produced its readiness signal in time
    #[error("`{command}` did not become ready within {timeout:?}")]
    StartupTimeout { command: String, timeout: Duration },

    /// The process exited before signaling readiness
    #[error("`{command}` exited before becoming ready (exit code {exit_code:?})")]
    Exited {
        command: String,
        exit_code: Option<i32>,
    },
}

/// Errors from tunnel negotiation
#[derive(Error, Debug)]
pub enum TunnelError {
    /// Every configured provider failed to produce a public URL
    #[error("No tunnel available: {providers} provider(s) failed across {rounds} round(s)")]
    NoTunnelAvailable { providers: usize, rounds: u32 },
}

/// Errors from backend API calls
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend answered registration with a non-success status
    #[error("Registration rejected with HTTP {status}: {body}")]
    RegistrationRejected { status: u16, body: String },

    /// The registration request never reached the backend
    #[error("Registration request failed: {source}")]
    RegistrationUnreachable {
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered a heartbeat with a non-success status
    #[error("Heartbeat rejected with HTTP {status}: {body}")]
    HeartbeatRejected { status: u16, body: String },

    /// A heartbeat request never reached the backend
    #[error("Heartbeat request failed: {source}")]
    HeartbeatUnreachable {
        #[source]
        source: reqwest::Error,
    },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}
