// src/exec/server.rs

use std::process::Stdio;
use std::time::Duration;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::SequencerError;
use crate::sequencer::SequencerEvent;

/// Handle to the spawned background server process.
///
/// Owned exclusively by the sequencer; there is at most one per sequencer
/// instance.
pub struct ServerHandle {
    pub child: Child,
    pub pid: Option<u32>,
}

/// Spawn the background server process (non-blocking).
///
/// The command runs under a platform shell, with the bind address exported as
/// `MODELBOOT_BIND`. Stdout and stderr are piped and drained at debug so OS
/// buffers never fill; if `ready_pattern` is set, the first matching stdout
/// line emits a single `SequencerEvent::ServerReady`.
///
/// A spawn error is fatal: the sequencer must never attempt setup against a
/// server that was never started.
pub fn spawn_server(
    cmd: &str,
    bind: &str,
    ready_pattern: Option<Regex>,
    events_tx: mpsc::Sender<SequencerEvent>,
) -> Result<ServerHandle, SequencerError> {
    info!(cmd = %cmd, bind = %bind, "starting background server");

    let mut command = shell_command(cmd);
    command
        .env("MODELBOOT_BIND", bind)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|source| SequencerError::SpawnFailure { source })?;

    let pid = child.id();
    debug!(?pid, "background server spawned");

    if let Some(stdout) = child.stdout.take() {
        spawn_stdout_monitor(stdout, ready_pattern, events_tx);
    } else if ready_pattern.is_some() {
        warn!("ready pattern configured but no stdout pipe available");
    }

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let reader = BufReader::new(stderr);
            let mut lines = reader.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("server stderr: {}", line);
            }
        });
    }

    Ok(ServerHandle { child, pid })
}

/// Terminate the background server: SIGTERM, bounded grace wait, then kill.
///
/// The termination request is delivered before this returns, so callers can
/// rely on the ordering "server signalled, then sequencer exits".
pub async fn terminate_server(handle: &mut ServerHandle, grace: Duration) {
    #[cfg(unix)]
    {
        if let Some(pid) = handle.pid {
            info!(pid, "sending SIGTERM to background server");
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = handle.child.start_kill();
    }

    match tokio::time::timeout(grace, handle.child.wait()).await {
        Ok(Ok(status)) => {
            info!(code = status.code().unwrap_or(-1), "background server exited");
        }
        Ok(Err(err)) => {
            warn!(error = %err, "error waiting for background server to exit");
        }
        Err(_) => {
            warn!(
                grace_ms = grace.as_millis() as u64,
                "background server did not exit within grace period, killing"
            );
            let _ = handle.child.kill().await;
        }
    }
}

fn spawn_stdout_monitor(
    stdout: tokio::process::ChildStdout,
    ready_pattern: Option<Regex>,
    events_tx: mpsc::Sender<SequencerEvent>,
) {
    tokio::spawn(async move {
        let reader = BufReader::new(stdout);
        let mut lines = reader.lines();
        let mut matched = false;

        while let Ok(Some(line)) = lines.next_line().await {
            debug!("server stdout: {}", line);

            if matched {
                continue;
            }
            if let Some(re) = &ready_pattern {
                if re.is_match(&line) {
                    matched = true;
                    debug!("server stdout matched ready pattern; emitting ServerReady");
                    let _ = events_tx.send(SequencerEvent::ServerReady).await;
                }
            }
        }

        debug!("server stdout monitor ended");
    });
}

/// Build a shell command appropriate for the platform.
fn shell_command(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

/// Check if a process with the given PID exists.
///
/// Uses `kill(pid, 0)`, which sends a null signal to check existence.
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as i32, 0) == 0 }
}
