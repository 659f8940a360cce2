//! Tunnel publication for the local automation server
//!
//! The agent exposes the automation server to the backend through a
//! third-party tunnel daemon (localtunnel by default, cloudflared as the
//! fallback). Providers are external processes; this module knows how to
//! launch them, recognize their public URL in process output, and fall
//! back down the list when one misbehaves.

mod negotiator;
mod provider;

pub use negotiator::{TunnelInfo, TunnelNegotiator};
pub use provider::{TunnelProvider, TunnelProviderKind};
