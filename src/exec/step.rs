// src/exec/step.rs

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

/// Run a single synchronous bring-up step (setup or foreground) to completion
/// and return its exit code.
///
/// The command runs under a platform shell. Stdout and stderr are drained at
/// debug. A launch error is returned as-is; whether a non-zero exit code is
/// fatal is the caller's policy, not this function's.
///
/// The child has `kill_on_drop` set, so if the caller abandons this future
/// (e.g. shutdown requested mid-step), the step process is reaped rather than
/// orphaned.
pub async fn run_step(name: &str, cmd: &str) -> std::io::Result<i32> {
    info!(step = %name, cmd = %cmd, "running step");

    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn()?;

    if let Some(stdout) = child.stdout.take() {
        let step = name.to_string();
        tokio::spawn(async move {
            let reader = BufReader::new(stdout);
            let mut lines = reader.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(step = %step, "stdout: {}", line);
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let step = name.to_string();
        tokio::spawn(async move {
            let reader = BufReader::new(stderr);
            let mut lines = reader.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(step = %step, "stderr: {}", line);
            }
        });
    }

    let status = child.wait().await?;
    let code = status.code().unwrap_or(-1);

    info!(
        step = %name,
        exit_code = code,
        success = status.success(),
        "step process exited"
    );

    Ok(code)
}
