//! Line-delimited JSON transport over a child process's stdio.
//!
//! Both container connectors talk to their harness through an engine CLI
//! process (`docker run -i` or `docker attach`) whose stdin/stdout carry
//! one JSON document per line.
//!
//! A request abandoned after its line was written leaves the reply unread,
//! so the connection refuses further requests instead of handing that reply
//! to the next caller.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::engine::ContainerEngine;
use super::trait_def::Connection;

/// How many trailing harness stderr lines are kept for error reports.
pub const STDERR_TAIL_LINES: usize = 200;

/// What closing the connection does beyond stopping the client process.
#[derive(Debug, Clone)]
pub enum Teardown {
    /// Bowtie owns the container: remove it.
    RemoveContainer {
        engine: ContainerEngine,
        name: String,
    },
    /// Someone else owns the container: only detach from it.
    Detach,
}

/// Live stdio handles of the client process.
///
/// Stays in place until teardown has finished, so an interrupted `close`
/// can be retried.
struct ProcessIo {
    child: Child,
    /// `None` once closing has begun.
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    /// Set while a request's reply is outstanding.
    awaiting_reply: bool,
}

/// A [`Connection`] speaking line-delimited JSON over a child's stdio.
pub struct ProcessConnection {
    /// Human-readable description used in errors and logs.
    label: String,
    io: Mutex<Option<ProcessIo>>,
    teardown: Teardown,
    /// Most recent stderr lines, reported when the harness hangs up.
    stderr: Arc<std::sync::Mutex<VecDeque<String>>>,
}

impl std::fmt::Debug for ProcessConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessConnection")
            .field("label", &self.label)
            .field("teardown", &self.teardown)
            .finish()
    }
}

/// Append `line`, dropping the oldest lines beyond `limit`.
fn push_tail(tail: &mut VecDeque<String>, line: String, limit: usize) {
    tail.push_back(line);
    while tail.len() > limit {
        tail.pop_front();
    }
}

impl ProcessConnection {
    /// Spawn `command` with piped stdio and wrap it as a connection.
    pub fn spawn(label: impl Into<String>, mut command: Command, teardown: Teardown) -> Result<Self> {
        let label = label.into();
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn process for {label}"))?;

        let stdin = child.stdin.take().context("child stdin was not captured")?;
        let stdout = child.stdout.take().context("child stdout was not captured")?;
        let stderr_tail = Arc::new(std::sync::Mutex::new(VecDeque::new()));

        if let Some(stderr) = child.stderr.take() {
            let sink = Arc::clone(&stderr_tail);
            let source = label.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(harness = %source, "{line}");
                    if let Ok(mut tail) = sink.lock() {
                        push_tail(&mut tail, line, STDERR_TAIL_LINES);
                    }
                }
            });
        }

        Ok(Self {
            label,
            io: Mutex::new(Some(ProcessIo {
                child,
                stdin: Some(stdin),
                stdout: BufReader::new(stdout).lines(),
                awaiting_reply: false,
            })),
            teardown,
            stderr: stderr_tail,
        })
    }

    fn collected_stderr(&self) -> String {
        self.stderr
            .lock()
            .map(|tail| tail.iter().map(String::as_str).collect::<Vec<_>>().join("\n"))
            .unwrap_or_default()
    }
}

#[async_trait]
impl Connection for ProcessConnection {
    async fn request(&self, message: &Value) -> Result<Value> {
        let mut guard = self.io.lock().await;
        let Some(io) = guard.as_mut() else {
            bail!("connection to {} is closed", self.label);
        };
        if io.awaiting_reply {
            bail!(
                "connection to {} was interrupted mid-request and cannot be reused",
                self.label
            );
        }
        let Some(stdin) = io.stdin.as_mut() else {
            bail!("connection to {} is closed", self.label);
        };

        let mut line = serde_json::to_string(message).context("failed to serialize request")?;
        line.push('\n');
        io.awaiting_reply = true;
        stdin
            .write_all(line.as_bytes())
            .await
            .with_context(|| format!("failed to write to {}", self.label))?;
        stdin
            .flush()
            .await
            .with_context(|| format!("failed to write to {}", self.label))?;

        let reply = io
            .stdout
            .next_line()
            .await
            .with_context(|| format!("failed to read from {}", self.label))?;
        io.awaiting_reply = false;

        match reply {
            Some(reply) => serde_json::from_str(&reply)
                .with_context(|| format!("malformed JSON from {}: {reply:?}", self.label)),
            None => bail!(
                "{} closed its output without replying; stderr:\n{}",
                self.label,
                self.collected_stderr()
            ),
        }
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.io.lock().await;
        let Some(io) = guard.as_mut() else {
            return Ok(());
        };
        drop(io.stdin.take());

        // `io` stays in place until removal returns; a cancelled close
        // leaves it for the next attempt.
        let removed = match &self.teardown {
            Teardown::RemoveContainer { engine, name } => {
                debug!(container = %name, "removing harness container");
                engine.remove_container(name).await
            }
            Teardown::Detach => Ok(()),
        };

        if let Some(mut io) = guard.take() {
            if let Err(e) = io.child.kill().await {
                warn!(harness = %self.label, error = %e, "failed to stop engine client process");
            }
        }

        removed
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::time::Duration;

    use super::*;

    fn cat() -> Command {
        Command::new("cat")
    }

    /// An engine script that logs its arguments to `log`; the first call
    /// then hangs for a long time.
    fn slow_engine(dir: &Path) -> (ContainerEngine, std::path::PathBuf) {
        let log = dir.join("engine.log");
        let marker = dir.join("called");
        let script = dir.join("engine");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$@\" >> {log}\nif [ ! -e {marker} ]; then touch {marker}; sleep 10; fi\n",
                log = log.display(),
                marker = marker.display(),
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        (ContainerEngine::new(script.to_string_lossy()), log)
    }

    #[tokio::test]
    async fn request_round_trips_through_cat() {
        let connection = ProcessConnection::spawn("cat", cat(), Teardown::Detach).unwrap();
        let reply = connection
            .request(&serde_json::json!({"cmd": "start", "version": 1}))
            .await
            .unwrap();
        assert_eq!(reply, serde_json::json!({"cmd": "start", "version": 1}));
        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_requests() {
        let connection = ProcessConnection::spawn("cat", cat(), Teardown::Detach).unwrap();
        connection.close().await.unwrap();
        connection.close().await.unwrap();

        let err = connection
            .request(&serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("is closed"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn eof_reports_stderr() {
        let mut command = Command::new("sh");
        command.args(["-c", "read line; echo boom >&2"]);
        let connection = ProcessConnection::spawn("sh", command, Teardown::Detach).unwrap();

        let err = connection
            .request(&serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(
            err.to_string().contains("closed its output"),
            "unexpected error: {err}"
        );
        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn spawn_failure_names_label() {
        let command = Command::new("/nonexistent/harness-xyz");
        let err = ProcessConnection::spawn("missing", command, Teardown::Detach).unwrap_err();
        assert!(err.to_string().contains("missing"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn interrupted_close_is_retried() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (engine, log) = slow_engine(tmp.path());
        let teardown = Teardown::RemoveContainer {
            engine,
            name: "c1".to_string(),
        };
        let connection = ProcessConnection::spawn("cat", cat(), teardown).unwrap();

        let first = tokio::time::timeout(Duration::from_millis(500), connection.close()).await;
        assert!(first.is_err(), "first close should still be removing");

        connection.close().await.unwrap();

        let calls = std::fs::read_to_string(&log).unwrap();
        assert_eq!(calls.lines().collect::<Vec<_>>(), ["rm --force c1", "rm --force c1"]);

        let err = connection
            .request(&serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("is closed"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn interrupted_request_poisons_connection() {
        let mut command = Command::new("sh");
        command.args(["-c", "read line; sleep 10"]);
        let connection = ProcessConnection::spawn("sh", command, Teardown::Detach).unwrap();

        let first = tokio::time::timeout(
            Duration::from_millis(200),
            connection.request(&serde_json::json!({"cmd": "start"})),
        )
        .await;
        assert!(first.is_err(), "harness never replies");

        let err = connection
            .request(&serde_json::json!({"cmd": "stop"}))
            .await
            .unwrap_err();
        assert!(
            err.to_string().contains("interrupted mid-request"),
            "unexpected error: {err}"
        );
        connection.close().await.unwrap();
    }

    #[test]
    fn stderr_tail_is_bounded() {
        let mut tail = VecDeque::new();
        for n in 0..(STDERR_TAIL_LINES + 50) {
            push_tail(&mut tail, format!("line {n}"), STDERR_TAIL_LINES);
        }
        assert_eq!(tail.len(), STDERR_TAIL_LINES);
        assert_eq!(tail.front().map(String::as_str), Some("line 50"));
        assert_eq!(
            tail.back().map(String::as_str),
            Some(format!("line {}", STDERR_TAIL_LINES + 49).as_str())
        );
    }
}
