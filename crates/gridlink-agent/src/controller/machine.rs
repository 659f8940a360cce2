//! Agent lifecycle state machine
//!
//! Pure transitions: [`step`] maps a state and an event to the next state
//! plus the actions the driver must perform. No I/O happens here, which
//! keeps every transition testable on its own.

use std::fmt;

/// Lifecycle states of the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    StartingServer,
    StartingTunnel,
    Registering,
    Heartbeating,
    /// Terminal: clean shutdown, process exits 0
    Stopped,
    /// Terminal: startup failed, process exits 1
    Failed,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentState::Idle => "idle",
            AgentState::StartingServer => "starting-server",
            AgentState::StartingTunnel => "starting-tunnel",
            AgentState::Registering => "registering",
            AgentState::Heartbeating => "heartbeating",
            AgentState::Stopped => "stopped",
            AgentState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Everything that can happen to the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentEvent {
    Start,
    ServerReady,
    TunnelEstablished,
    RegistrationAccepted,
    HeartbeatTick,
    StartupFailed,
    ShutdownRequested,
}

/// Side effects the driver performs after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    LaunchServer,
    NegotiateTunnel,
    RegisterAgent,
    StartHeartbeat,
    SendHeartbeat,
    ShutdownChildren,
}

/// Advance the machine by one event.
///
/// A (state, event) pair with no transition leaves the state unchanged and
/// requests nothing; terminal states absorb every event.
pub fn step(state: AgentState, event: AgentEvent) -> (AgentState, Vec<Action>) {
    use AgentEvent::*;
    use AgentState::*;

    match (state, event) {
        (Idle, Start) => (StartingServer, vec![Action::LaunchServer]),
        (StartingServer, ServerReady) => (StartingTunnel, vec![Action::NegotiateTunnel]),
        (StartingTunnel, TunnelEstablished) => (Registering, vec![Action::RegisterAgent]),
        (Registering, RegistrationAccepted) => (Heartbeating, vec![Action::StartHeartbeat]),
        (Heartbeating, HeartbeatTick) => (Heartbeating, vec![Action::SendHeartbeat]),
        (Heartbeating, ShutdownRequested) => (Stopped, vec![Action::ShutdownChildren]),
        (StartingServer | StartingTunnel | Registering, StartupFailed) => {
            (Failed, vec![Action::ShutdownChildren])
        }
        (state, _) => (state, Vec::new()),
    }
}
