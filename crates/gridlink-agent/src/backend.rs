//! HTTP client for the GridLink backend
//!
//! Two single-shot calls: register the public tunnel URL after startup,
//! and heartbeat while running. Registration errors are fatal and surface
//! to the caller; heartbeat errors are captured in an outcome so a flaky
//! backend can never take the agent down.

use std::time::Duration;

use serde::Serialize;

use gridlink_core::error::BackendError;
use gridlink_core::identity::AgentIdentity;
use gridlink_core::time::{current_time_millis, elapsed_millis};

const REGISTER_PATH: &str = "/api/v1/devices/register-agent";
const HEARTBEAT_PATH: &str = "/api/v1/devices/heartbeat";

/// Outcome of a single heartbeat attempt. Logged, never persisted.
#[derive(Debug, Clone)]
pub struct HeartbeatOutcome {
    pub success: bool,
    /// Unix timestamp in milliseconds of when the attempt finished
    pub timestamp: u64,
    pub error_detail: Option<String>,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    tunnel_url: &'a str,
    appium_port: u16,
    license_key: &'a str,
    device_id: &'a str,
}

#[derive(Serialize)]
struct HeartbeatRequest<'a> {
    tunnel_url: &'a str,
    status: &'a str,
}

/// Client for the backend device API
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    identity: AgentIdentity,
    request_timeout: Duration,
}

impl BackendClient {
    /// Create a client addressing `base_url` with a per-request timeout
    pub fn new(
        base_url: impl Into<String>,
        identity: AgentIdentity,
        request_timeout: Duration,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            identity,
            request_timeout,
        }
    }

    /// The identity this client presents to the backend
    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    /// Register the agent's public tunnel URL with the backend.
    ///
    /// One shot: any non-success status or transport failure is returned
    /// to the caller, which treats it as fatal to startup.
    pub async fn register(&self, tunnel_url: &str) -> Result<(), BackendError> {
        let body = RegisterRequest {
            tunnel_url,
            appium_port: self.identity.automation_server_port(),
            license_key: self.identity.license_key(),
            device_id: self.identity.device_id().as_str(),
        };

        let response = self
            .client
            .post(format!("{}{}", self.base_url, REGISTER_PATH))
            .timeout(self.request_timeout)
            .header("Content-Type", "application/json")
            .header("X-License-Key", self.identity.license_key())
            .header("X-Device-ID", self.identity.device_id().as_str())
            .json(&body)
            .send()
            .await
            .map_err(|source| BackendError::RegistrationUnreachable { source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::RegistrationRejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(
            "Registered device {} with backend",
            self.identity.device_id()
        );
        Ok(())
    }

    /// Send one heartbeat for the registered tunnel URL.
    ///
    /// Never fails: the outcome carries any error detail instead.
    pub async fn heartbeat(&self, tunnel_url: &str) -> HeartbeatOutcome {
        let started = current_time_millis();
        let result = self.try_heartbeat(tunnel_url).await;
        tracing::debug!("Heartbeat round trip took {}ms", elapsed_millis(started));

        match result {
            Ok(()) => HeartbeatOutcome {
                success: true,
                timestamp: current_time_millis(),
                error_detail: None,
            },
            Err(e) => HeartbeatOutcome {
                success: false,
                timestamp: current_time_millis(),
                error_detail: Some(e.to_string()),
            },
        }
    }

    async fn try_heartbeat(&self, tunnel_url: &str) -> Result<(), BackendError> {
        let body = HeartbeatRequest {
            tunnel_url,
            status: "active",
        };

        let response = self
            .client
            .post(format!("{}{}", self.base_url, HEARTBEAT_PATH))
            .timeout(self.request_timeout)
            .header("X-License-Key", self.identity.license_key())
            .header("X-Device-ID", self.identity.device_id().as_str())
            .json(&body)
            .send()
            .await
            .map_err(|source| BackendError::HeartbeatUnreachable { source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::HeartbeatRejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
