//! gridlink-core: Shared types and configuration for GridLink
//!
//! This crate provides the identity types, error taxonomy, configuration
//! structures, and time helpers used by the agent daemon.

pub mod config;
pub mod error;
pub mod identity;
pub mod time;

pub use error::GridLinkError;
pub use identity::{AgentIdentity, DeviceId};
