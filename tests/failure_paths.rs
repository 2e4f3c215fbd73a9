#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use modelboot::errors::SequencerError;
use modelboot::sequencer::{Plan, Sequencer, SequencerEvent};

fn plan(server_cmd: String, setup_cmd: String, run_cmd: String, delay: Duration) -> Plan {
    Plan {
        server_cmd,
        bind: "127.0.0.1:0".into(),
        setup_cmd,
        run_cmd,
        ready_delay: delay,
        probe: false,
        probe_attempts: 10,
        probe_backoff: Duration::from_millis(100),
        ready_pattern: None,
        term_grace: Duration::from_secs(2),
    }
}

fn log_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|l| l.to_string())
        .collect()
}

async fn wait_for_marker(path: &Path, marker: &str, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    loop {
        if log_lines(path).iter().any(|l| l == marker) {
            return;
        }
        if Instant::now() > deadline {
            panic!("marker '{marker}' did not appear in {path:?} within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

fn marker_log(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("markers.log")
}

#[tokio::test]
async fn server_death_during_bringup_is_fatal_and_setup_never_runs() {
    let dir = tempfile::tempdir().unwrap();
    let log = marker_log(&dir);

    let p = plan(
        "exit 7".into(),
        format!("echo setup >> {}", log.display()),
        format!("echo run >> {}", log.display()),
        Duration::from_millis(300),
    );

    let (tx, rx) = mpsc::channel(16);
    let seq = Sequencer::new(p, rx, tx);

    let result = seq.run().await;
    match result {
        Err(SequencerError::ServerExited { code }) => assert_eq!(code, 7),
        other => panic!("expected ServerExited, got {other:?}"),
    }

    // Neither step may have been invoked.
    assert!(log_lines(&log).is_empty(), "steps ran after a dead server");
}

#[tokio::test]
async fn nonzero_setup_exit_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let log = marker_log(&dir);

    let p = plan(
        "sleep 30".into(),
        "exit 3".into(),
        format!("echo run >> {}", log.display()),
        Duration::ZERO,
    );

    let (tx, rx) = mpsc::channel(16);
    let seq = Sequencer::new(p, rx, tx.clone());
    let handle = tokio::spawn(seq.run());

    // The foreground step still runs despite the failed setup.
    wait_for_marker(&log, "run", Duration::from_secs(5)).await;

    tx.send(SequencerEvent::ShutdownRequested).await.unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_during_readiness_wait_skips_setup() {
    let dir = tempfile::tempdir().unwrap();
    let log = marker_log(&dir);

    let p = plan(
        format!("echo server >> {}; sleep 30", log.display()),
        format!("echo setup >> {}", log.display()),
        "true".into(),
        Duration::from_secs(10),
    );

    let (tx, rx) = mpsc::channel(16);
    let seq = Sequencer::new(p, rx, tx.clone());
    let handle = tokio::spawn(seq.run());

    wait_for_marker(&log, "server", Duration::from_secs(5)).await;
    tx.send(SequencerEvent::ShutdownRequested).await.unwrap();

    // Returns Ok well before the 10s readiness delay would have elapsed.
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("sequencer did not stop after shutdown request");
    result.unwrap().unwrap();

    assert_eq!(log_lines(&log), vec!["server"], "setup ran despite shutdown");
}
