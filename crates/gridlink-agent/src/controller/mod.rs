//! Agent lifecycle orchestration
//!
//! The controller walks the agent through startup (automation server,
//! tunnel, registration) and then the heartbeat loop, one awaited step at
//! a time. Transitions go through the pure state machine in [`machine`];
//! this module performs the requested actions and feeds the results back
//! in as events.

mod heartbeat;
mod machine;

pub use machine::{Action, AgentEvent, AgentState};

use std::collections::VecDeque;
use std::io;

use tokio_util::sync::CancellationToken;

use gridlink_core::config::AgentConfig;
use gridlink_core::error::{GridLinkError, ProcessError};

use crate::backend::BackendClient;
use crate::process::{self, ProcessHandle};
use crate::tunnel::{TunnelInfo, TunnelNegotiator};

use heartbeat::HeartbeatTimer;

/// Orchestrates the agent from start to a terminal state
pub struct AgentController {
    config: AgentConfig,
    backend: BackendClient,
    state: AgentState,
    server: Option<ProcessHandle>,
    tunnel: Option<TunnelInfo>,
    failure: Option<GridLinkError>,
}

impl AgentController {
    pub fn new(config: AgentConfig, backend: BackendClient) -> Self {
        Self {
            config,
            backend,
            state: AgentState::Idle,
            server: None,
            tunnel: None,
            failure: None,
        }
    }

    /// Run the agent until it reaches a terminal state.
    ///
    /// Returns Ok after a clean signal shutdown, and the startup error if
    /// the agent failed before reaching the heartbeat loop. The shutdown
    /// token is observed once heartbeating; earlier, startup completes or
    /// fails on its own terms. Children are killed before either return.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), GridLinkError> {
        let mut pending = VecDeque::from([AgentEvent::Start]);

        while let Some(event) = pending.pop_front() {
            let (next, actions) = machine::step(self.state, event);
            if next != self.state {
                tracing::info!("Agent state: {} -> {}", self.state, next);
                self.state = next;
            }

            for action in actions {
                if let Some(follow_up) = self.perform(action, &shutdown).await {
                    pending.push_back(follow_up);
                }
            }
        }

        match self.state {
            AgentState::Stopped => {
                tracing::info!("Agent stopped cleanly");
                Ok(())
            }
            _ => {
                let error = self.failure.take().unwrap_or_else(|| {
                    GridLinkError::Io(io::Error::other("agent halted without a recorded error"))
                });
                tracing::error!("Agent failed: {}", error);
                Err(error)
            }
        }
    }

    async fn perform(&mut self, action: Action, shutdown: &CancellationToken) -> Option<AgentEvent> {
        match action {
            Action::LaunchServer => match self.launch_server().await {
                Ok(handle) => {
                    self.server = Some(handle);
                    Some(AgentEvent::ServerReady)
                }
                Err(e) => self.fail(e.into()),
            },
            Action::NegotiateTunnel => {
                let negotiator = TunnelNegotiator::from_config(
                    &self.config.tunnel,
                    self.config.automation_server.port,
                );
                match negotiator.negotiate().await {
                    Ok(info) => {
                        self.tunnel = Some(info);
                        Some(AgentEvent::TunnelEstablished)
                    }
                    Err(e) => self.fail(e.into()),
                }
            }
            Action::RegisterAgent => {
                let url = match &self.tunnel {
                    Some(tunnel) => tunnel.public_url.clone(),
                    None => {
                        // Unreachable through the machine: registration is
                        // only requested after a tunnel is captured.
                        tracing::error!("Registration requested without a tunnel");
                        return self.fail(GridLinkError::Io(io::Error::other(
                            "registration requested without a tunnel",
                        )));
                    }
                };
                match self.backend.register(&url).await {
                    Ok(()) => Some(AgentEvent::RegistrationAccepted),
                    Err(e) => self.fail(e.into()),
                }
            }
            Action::StartHeartbeat => {
                tracing::info!(
                    "Heartbeat loop armed (interval {:?})",
                    self.config.heartbeat.interval
                );
                self.run_heartbeating(shutdown).await;
                Some(AgentEvent::ShutdownRequested)
            }
            Action::SendHeartbeat => {
                self.send_heartbeat().await;
                None
            }
            Action::ShutdownChildren => {
                self.shutdown_children();
                None
            }
        }
    }

    /// Drive ticks through the machine until shutdown is requested. Each
    /// heartbeat is awaited before the next tick, so sends never overlap.
    async fn run_heartbeating(&mut self, shutdown: &CancellationToken) {
        let mut timer = HeartbeatTimer::new(self.config.heartbeat.interval, shutdown.clone());

        while timer.tick().await {
            let (next, actions) = machine::step(self.state, AgentEvent::HeartbeatTick);
            self.state = next;
            for action in actions {
                if action == Action::SendHeartbeat {
                    self.send_heartbeat().await;
                }
            }
        }
    }

    async fn launch_server(&self) -> Result<ProcessHandle, ProcessError> {
        let server = &self.config.automation_server;
        let args = server.expanded_args();
        tracing::info!(
            "Starting automation server: {} (port {})",
            server.command,
            server.port
        );

        let pattern = server.ready_pattern.clone();
        let (handle, ()) = process::start(
            &server.command,
            &args,
            move |line: &str| line.contains(&pattern).then_some(()),
            server.startup_timeout,
            |source, line: &str| tracing::debug!("[server {}] {}", source, line),
        )
        .await?;

        tracing::info!("Automation server ready on port {}", server.port);
        Ok(handle)
    }

    async fn send_heartbeat(&mut self) {
        let Some(url) = self.tunnel.as_ref().map(|t| t.public_url.clone()) else {
            return;
        };

        let outcome = self.backend.heartbeat(&url).await;
        if outcome.success {
            tracing::debug!("Heartbeat delivered at {}", outcome.timestamp);
        } else {
            let detail = outcome.error_detail.as_deref().unwrap_or("unknown error");
            tracing::warn!("Heartbeat failed (agent stays up): {}", detail);
        }
    }

    /// Record a fatal startup error and request the failure transition.
    fn fail(&mut self, error: GridLinkError) -> Option<AgentEvent> {
        tracing::error!("Startup step failed: {}", error);
        if self.failure.is_none() {
            self.failure = Some(error);
        }
        Some(AgentEvent::StartupFailed)
    }

    fn shutdown_children(&mut self) {
        // Tunnel first: it fronts the server, so the public URL goes away
        // before the port behind it.
        if let Some(mut tunnel) = self.tunnel.take() {
            tracing::info!("Stopping {} tunnel ({})", tunnel.provider, tunnel.public_url);
            tunnel.handle.stop();
        }
        if let Some(mut server) = self.server.take() {
            tracing::info!(
                "Stopping automation server after {:?}",
                server.started_at().elapsed()
            );
            server.stop();
        }
    }
}
