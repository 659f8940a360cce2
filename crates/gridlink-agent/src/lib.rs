//! gridlink-agent: Device bridge agent for GridLink
//!
//! The agent runs on a host that owns automation-capable devices. It starts
//! the local Appium server, publishes it to the internet through a tunnel
//! provider, registers the public URL with the GridLink backend, and keeps
//! that registration alive with heartbeats until interrupted.

pub mod backend;
pub mod controller;
pub mod process;
pub mod tunnel;

pub use controller::AgentController;
