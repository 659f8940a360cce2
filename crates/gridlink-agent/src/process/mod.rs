//! Child process supervision
//!
//! Wraps one external executable: spawn it with piped output, watch its
//! lines for a readiness signal, and kill it when the agent is done. Both
//! children the agent manages (the automation server and the tunnel
//! provider) go through this module.

use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use gridlink_core::error::ProcessError;

/// Capacity of the channel carrying the first readiness match from the
/// output pumps back to `start`. One slot is enough: only the first match
/// is consumed, later sends are dropped on purpose.
const READY_CHANNEL_CAPACITY: usize = 1;

/// Which output stream a forwarded line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSource {
    Stdout,
    Stderr,
}

impl fmt::Display for LineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineSource::Stdout => write!(f, "stdout"),
            LineSource::Stderr => write!(f, "stderr"),
        }
    }
}

/// Handle to a live supervised child process.
///
/// Dropping the handle kills the child; nothing the agent spawns may
/// outlive it.
#[derive(Debug)]
pub struct ProcessHandle {
    command: String,
    args: Vec<String>,
    child: Child,
    pid: Option<u32>,
    started_at: Instant,
}

impl ProcessHandle {
    /// The executable this handle supervises
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Arguments the child was launched with
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// OS process id of the child
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// When the child was spawned
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Whether the child is still running
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Request termination. Fire-and-forget: the caller is shutting down
    /// and does not wait for the exit to be observed.
    pub fn stop(&mut self) {
        tracing::debug!("Stopping {} (pid {:?})", self.command, self.pid);
        if let Err(e) = self.child.start_kill() {
            tracing::debug!("Kill request for {} failed: {}", self.command, e);
        }
    }
}

/// Spawn `command` and wait for its output to satisfy `readiness`.
///
/// Every stdout and stderr line is forwarded to `sink` for the lifetime of
/// the child, including after this call returns. The first line for which
/// `readiness` returns `Some` resolves the call with the extracted value
/// and a handle to the still-running child.
///
/// A child that exits before matching fails with [`ProcessError::Exited`];
/// one that stays silent past `timeout` is killed and fails with
/// [`ProcessError::StartupTimeout`]. Either way no process outlives a
/// failed start.
pub async fn start<T, R, S>(
    command: &str,
    args: &[String],
    readiness: R,
    timeout: Duration,
    sink: S,
) -> Result<(ProcessHandle, T), ProcessError>
where
    T: Send + 'static,
    R: Fn(&str) -> Option<T> + Send + Sync + 'static,
    S: Fn(LineSource, &str) + Send + Sync + 'static,
{
    let mut child = Command::new(command)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            command: command.to_string(),
            source,
        })?;

    let pid = child.id();
    let started_at = Instant::now();
    tracing::debug!("Spawned {} (pid {:?})", command, pid);

    let (ready_tx, mut ready_rx) = mpsc::channel(READY_CHANNEL_CAPACITY);
    let readiness = Arc::new(readiness);
    let sink = Arc::new(sink);

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(pump_lines(
            stdout,
            LineSource::Stdout,
            Arc::clone(&readiness),
            Arc::clone(&sink),
            ready_tx.clone(),
        ));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(pump_lines(
            stderr,
            LineSource::Stderr,
            readiness,
            sink,
            ready_tx.clone(),
        ));
    }
    // Readiness arrives only from the pumps; dropping our sender lets
    // `recv` observe both of them ending.
    drop(ready_tx);

    match tokio::time::timeout(timeout, ready_rx.recv()).await {
        Ok(Some(value)) => {
            let handle = ProcessHandle {
                command: command.to_string(),
                args: args.to_vec(),
                child,
                pid,
                started_at,
            };
            Ok((handle, value))
        }
        Ok(None) => {
            // Both output streams closed without a readiness match, which
            // in practice means the child died on startup. The kill covers
            // the rare child that closed its output but lingered.
            let _ = child.start_kill();
            let exit_code = child.wait().await.ok().and_then(|status| status.code());
            Err(ProcessError::Exited {
                command: command.to_string(),
                exit_code,
            })
        }
        Err(_) => {
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to kill {} after startup timeout: {}", command, e);
            }
            Err(ProcessError::StartupTimeout {
                command: command.to_string(),
                timeout,
            })
        }
    }
}

async fn pump_lines<T, R, S>(
    stream: impl AsyncRead + Unpin,
    source: LineSource,
    readiness: Arc<R>,
    sink: Arc<S>,
    ready_tx: mpsc::Sender<T>,
) where
    R: Fn(&str) -> Option<T>,
    S: Fn(LineSource, &str),
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        (*sink)(source, &line);
        if let Some(value) = (*readiness)(&line) {
            // A full or closed channel means readiness was already
            // observed; only the first match counts.
            let _ = ready_tx.try_send(value);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn sh(script: &str) -> (String, Vec<String>) {
        (
            "/bin/sh".to_string(),
            vec!["-c".to_string(), script.to_string()],
        )
    }

    fn no_sink(_: LineSource, _: &str) {}

    #[tokio::test]
    async fn test_start_resolves_on_ready_line() {
        let (cmd, args) = sh("echo booting; echo ready; sleep 10");
        let (mut handle, ()) = start(
            &cmd,
            &args,
            |line: &str| line.contains("ready").then_some(()),
            Duration::from_secs(5),
            no_sink,
        )
        .await
        .unwrap();

        assert!(handle.is_alive());
        assert_eq!(handle.command(), "/bin/sh");
        assert!(handle.args().iter().any(|a| a.contains("ready")));
        handle.stop();
    }

    #[tokio::test]
    async fn test_start_extracts_value_from_ready_line() {
        let (cmd, args) = sh("echo 'tunnel at https://x.example.dev'; sleep 10");
        let (mut handle, url) = start(
            &cmd,
            &args,
            |line: &str| {
                line.split_whitespace()
                    .find(|t| t.starts_with("https://"))
                    .map(str::to_string)
            },
            Duration::from_secs(5),
            no_sink,
        )
        .await
        .unwrap();

        assert_eq!(url, "https://x.example.dev");
        handle.stop();
    }

    #[tokio::test]
    async fn test_readiness_matches_on_stderr() {
        let (cmd, args) = sh("echo 'https://x.example.dev' >&2; sleep 10");
        let (mut handle, ()) = start(
            &cmd,
            &args,
            |line: &str| line.contains("https://").then_some(()),
            Duration::from_secs(5),
            no_sink,
        )
        .await
        .unwrap();

        handle.stop();
    }

    #[tokio::test]
    async fn test_spawn_failure_for_missing_binary() {
        let err = start(
            "/definitely/not/a/binary",
            &[],
            |_: &str| Some(()),
            Duration::from_secs(1),
            no_sink,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_startup_timeout_for_silent_child() {
        let (cmd, args) = sh("sleep 10");
        let started = Instant::now();
        let err = start(
            &cmd,
            &args,
            |_: &str| None::<()>,
            Duration::from_millis(300),
            no_sink,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ProcessError::StartupTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_exit_before_ready_reports_code() {
        let (cmd, args) = sh("echo nope; exit 3");
        let err = start(
            &cmd,
            &args,
            |line: &str| line.contains("ready").then_some(()),
            Duration::from_secs(5),
            no_sink,
        )
        .await
        .unwrap_err();

        match err {
            ProcessError::Exited { exit_code, .. } => assert_eq!(exit_code, Some(3)),
            other => panic!("expected Exited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sink_receives_both_streams() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink_lines = Arc::clone(&lines);

        let (cmd, args) = sh("echo out-line; echo err-line >&2; echo ready; sleep 10");
        let (mut handle, ()) = start(
            &cmd,
            &args,
            |line: &str| line.contains("ready").then_some(()),
            Duration::from_secs(5),
            move |source, line: &str| sink_lines.lock().unwrap().push((source, line.to_string())),
        )
        .await
        .unwrap();

        // The pumps run concurrently with this test; give them a beat.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let seen = lines.lock().unwrap().clone();
        assert!(seen
            .iter()
            .any(|(s, l)| *s == LineSource::Stdout && l == "out-line"));
        assert!(seen
            .iter()
            .any(|(s, l)| *s == LineSource::Stderr && l == "err-line"));
        handle.stop();
    }
}
