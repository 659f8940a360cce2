//! End-to-end agent lifecycle tests
//!
//! Drives the controller against shell-script stand-ins for the automation
//! server and the tunnel providers, and a mock backend.

#![cfg(unix)]

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gridlink_agent::backend::BackendClient;
use gridlink_agent::AgentController;
use gridlink_core::config::{AgentConfig, TunnelProviderConfig};
use gridlink_core::error::{BackendError, GridLinkError, ProcessError, TunnelError};
use gridlink_core::identity::AgentIdentity;

const REGISTER: &str = "/api/v1/devices/register-agent";
const HEARTBEAT: &str = "/api/v1/devices/heartbeat";

fn sh(script: &str) -> (String, Vec<String>) {
    (
        "/bin/sh".to_string(),
        vec!["-c".to_string(), script.to_string()],
    )
}

fn sh_provider(script: &str, suffix: &str) -> TunnelProviderConfig {
    let (command, args) = sh(script);
    TunnelProviderConfig {
        command,
        args,
        url_suffix: suffix.to_string(),
    }
}

/// Config wired to fast fakes: instant server, instant primary tunnel,
/// dead fallback, 200ms heartbeats.
fn test_config(backend_url: &str) -> AgentConfig {
    let mut config = AgentConfig::default();
    config.backend_url = backend_url.to_string();
    config.license_key = "lk-test".to_string();
    config.device_id = Some("dev-test".to_string());

    let (command, args) = sh("echo 'automation listener started'; sleep 30");
    config.automation_server.command = command;
    config.automation_server.args = args;
    config.automation_server.ready_pattern = "listener started".to_string();
    config.automation_server.startup_timeout = Duration::from_secs(5);

    config.tunnel.primary = sh_provider(
        "echo 'your url is: https://agent-one.loca.lt'; sleep 30",
        "loca.lt",
    );
    config.tunnel.fallback = sh_provider("exit 1", "trycloudflare.com");
    config.tunnel.startup_timeout = Duration::from_secs(5);
    config.tunnel.round_delay = Duration::from_millis(50);

    config.heartbeat.interval = Duration::from_millis(200);
    config.heartbeat.request_timeout = Duration::from_secs(2);

    config
}

fn controller_for(config: &AgentConfig) -> AgentController {
    let identity = AgentIdentity::from_config(config).unwrap();
    let backend = BackendClient::new(
        config.backend_url.clone(),
        identity,
        config.heartbeat.request_timeout,
    );
    AgentController::new(config.clone(), backend)
}

#[tokio::test]
async fn test_full_lifecycle_heartbeats_then_stops_cleanly() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REGISTER))
        .and(body_string_contains("agent-one.loca.lt"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(HEARTBEAT))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let controller = controller_for(&test_config(&server.uri()));
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();

    let run = tokio::spawn(controller.run(shutdown));

    // Let a few heartbeats through, then request shutdown.
    tokio::time::sleep(Duration::from_millis(900)).await;
    trigger.cancel();

    let result = run.await.unwrap();
    assert!(result.is_ok(), "expected clean shutdown, got {:?}", result);

    let beats = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == HEARTBEAT)
        .count();
    assert!(beats >= 2, "expected at least two heartbeats, saw {}", beats);
}

#[tokio::test]
async fn test_rejected_registration_fails_without_heartbeats() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REGISTER))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(serde_json::json!({"detail": "invalid license"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(HEARTBEAT))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let controller = controller_for(&test_config(&server.uri()));
    let err = controller.run(CancellationToken::new()).await.unwrap_err();

    match err {
        GridLinkError::Backend(BackendError::RegistrationRejected { status, body }) => {
            assert_eq!(status, 401);
            assert!(body.contains("invalid license"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_no_tunnel_fails_before_registration() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REGISTER))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.tunnel.primary = sh_provider("exit 1", "loca.lt");
    config.tunnel.fallback = sh_provider("exit 1", "trycloudflare.com");

    let controller = controller_for(&config);
    let err = controller.run(CancellationToken::new()).await.unwrap_err();

    match err {
        GridLinkError::Tunnel(TunnelError::NoTunnelAvailable { providers, rounds }) => {
            assert_eq!(providers, 2);
            assert_eq!(rounds, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_silent_server_fails_without_backend_traffic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REGISTER))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    let (command, args) = sh("sleep 30");
    config.automation_server.command = command;
    config.automation_server.args = args;
    config.automation_server.startup_timeout = Duration::from_millis(300);

    let controller = controller_for(&config);
    let err = controller.run(CancellationToken::new()).await.unwrap_err();

    assert!(matches!(
        err,
        GridLinkError::Process(ProcessError::StartupTimeout { .. })
    ));
}

#[tokio::test]
async fn test_fallback_tunnel_url_reaches_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REGISTER))
        .and(body_string_contains("trycloudflare.com"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(HEARTBEAT))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.tunnel.primary = sh_provider("sleep 30", "loca.lt");
    config.tunnel.fallback = sh_provider(
        "echo 'https://rescued.trycloudflare.com' >&2; sleep 30",
        "trycloudflare.com",
    );
    config.tunnel.startup_timeout = Duration::from_millis(300);

    let controller = controller_for(&config);
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();

    let run = tokio::spawn(controller.run(shutdown));
    tokio::time::sleep(Duration::from_millis(800)).await;
    trigger.cancel();

    let result = run.await.unwrap();
    assert!(result.is_ok(), "expected clean shutdown, got {:?}", result);
}

#[tokio::test]
async fn test_heartbeat_failures_do_not_stop_the_agent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REGISTER))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(HEARTBEAT))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend down"))
        .mount(&server)
        .await;

    let controller = controller_for(&test_config(&server.uri()));
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();

    let run = tokio::spawn(controller.run(shutdown));
    tokio::time::sleep(Duration::from_millis(900)).await;
    trigger.cancel();

    // Every heartbeat failed, yet the shutdown is still the clean path.
    let result = run.await.unwrap();
    assert!(result.is_ok(), "expected clean shutdown, got {:?}", result);

    let beats = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == HEARTBEAT)
        .count();
    assert!(beats >= 2, "ticks must continue past failures, saw {}", beats);
}
