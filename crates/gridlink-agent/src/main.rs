//! GridLink agent daemon
//!
//! Starts the local automation server, publishes it through a tunnel
//! provider, registers the public URL with the GridLink backend, and keeps
//! the registration alive with heartbeats until interrupted.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gridlink_agent::backend::BackendClient;
use gridlink_agent::AgentController;
use gridlink_core::config::{self, AgentConfig};
use gridlink_core::identity::AgentIdentity;

#[derive(Parser)]
#[command(name = "gridlink-agent")]
#[command(about = "GridLink device bridge agent - publishes a local Appium server to the backend")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config)
    #[arg(long)]
    backend_url: Option<String>,

    /// License key for the backend account
    #[arg(long, env = "GRIDLINK_LICENSE_KEY")]
    license_key: Option<String>,

    /// Device identifier (derived from host name and port if not set)
    #[arg(long, env = "GRIDLINK_DEVICE_ID")]
    device_id: Option<String>,

    /// Automation server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level: &str = if args.foreground {
        "debug"
    } else {
        &args.log_level
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("GridLink agent starting...");

    // Load configuration
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);

    let mut config = if config_path.exists() {
        config::load_config(&config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from {:?}: {}", config_path, e);
            AgentConfig::default()
        })
    } else {
        AgentConfig::default()
    };

    // Apply command-line overrides
    if let Some(backend_url) = args.backend_url {
        config.backend_url = backend_url;
    }
    if let Some(license_key) = args.license_key {
        config.license_key = license_key;
    }
    if let Some(device_id) = args.device_id {
        config.device_id = Some(device_id);
    }
    if let Some(port) = args.port {
        config.automation_server.port = port;
    }

    // Identity is fixed from here on; registration and every heartbeat
    // address the same device record.
    let identity = AgentIdentity::from_config(&config).context("Invalid agent configuration")?;

    let key_prefix: String = identity.license_key().chars().take(4).collect();
    tracing::info!(
        "Device {} (license {}***), automation server on port {}",
        identity.device_id(),
        key_prefix,
        identity.automation_server_port()
    );
    tracing::info!("Backend: {}", config.backend_url);

    let backend = BackendClient::new(
        config.backend_url.clone(),
        identity,
        config.heartbeat.request_timeout,
    );

    // Create cancellation token for graceful shutdown
    let shutdown = CancellationToken::new();

    // Setup signal handlers
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        shutdown_clone.cancel();
    });

    let controller = AgentController::new(config, backend);
    controller.run(shutdown).await?;

    tracing::info!("GridLink agent shutdown complete");
    Ok(())
}
