//! Ordered tunnel-provider negotiation

use std::time::Duration;

use gridlink_core::config::TunnelConfig;
use gridlink_core::error::{ProcessError, TunnelError};

use super::provider::{TunnelProvider, TunnelProviderKind};
use crate::process::{self, ProcessHandle};

/// A live tunnel: the provider that won, its public URL, and the child
/// process keeping the tunnel open
#[derive(Debug)]
pub struct TunnelInfo {
    pub provider: TunnelProviderKind,
    pub public_url: String,
    pub handle: ProcessHandle,
}

/// Tries providers in a fixed order until one reports a public URL
pub struct TunnelNegotiator {
    providers: Vec<TunnelProvider>,
    startup_timeout: Duration,
    rounds: u32,
    round_delay: Duration,
}

impl TunnelNegotiator {
    pub fn new(
        providers: Vec<TunnelProvider>,
        startup_timeout: Duration,
        rounds: u32,
        round_delay: Duration,
    ) -> Self {
        Self {
            providers,
            startup_timeout,
            rounds: rounds.max(1),
            round_delay,
        }
    }

    /// Build the primary/fallback pair from config for the given local port
    pub fn from_config(config: &TunnelConfig, port: u16) -> Self {
        Self::new(
            vec![
                TunnelProvider::from_config(TunnelProviderKind::Primary, &config.primary, port),
                TunnelProvider::from_config(TunnelProviderKind::Fallback, &config.fallback, port),
            ],
            config.startup_timeout,
            config.rounds,
            config.round_delay,
        )
    }

    /// Try each provider in order, for up to the configured number of
    /// rounds. The first URL wins and later providers are not attempted;
    /// a failed provider is killed before the next one starts.
    pub async fn negotiate(&self) -> Result<TunnelInfo, TunnelError> {
        for round in 1..=self.rounds {
            if round > 1 {
                tracing::info!("Retrying tunnel negotiation (round {}/{})", round, self.rounds);
                tokio::time::sleep(self.round_delay).await;
            }

            for provider in &self.providers {
                match self.try_provider(provider).await {
                    Ok(info) => {
                        tracing::info!(
                            "Tunnel established via {} provider: {}",
                            info.provider,
                            info.public_url
                        );
                        return Ok(info);
                    }
                    Err(e) => {
                        tracing::warn!("{} tunnel provider failed: {}", provider.kind, e);
                    }
                }
            }
        }

        Err(TunnelError::NoTunnelAvailable {
            providers: self.providers.len(),
            rounds: self.rounds,
        })
    }

    async fn try_provider(&self, provider: &TunnelProvider) -> Result<TunnelInfo, ProcessError> {
        tracing::info!(
            "Starting {} tunnel provider: {}",
            provider.kind,
            provider.command
        );

        let kind = provider.kind;
        let matcher = provider.clone();
        let (handle, public_url) = process::start(
            &provider.command,
            &provider.args,
            move |line: &str| matcher.match_url(line),
            self.startup_timeout,
            move |source, line: &str| {
                tracing::debug!("[{} tunnel {}] {}", kind, source, line);
            },
        )
        .await?;

        Ok(TunnelInfo {
            provider: kind,
            public_url,
            handle,
        })
    }
}
