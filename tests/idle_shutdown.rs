#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use modelboot::exec::is_process_alive;
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
    dir.path().join("idle.log")
}

/// Server script that records its pid and a marker when it receives SIGTERM,
/// so tests can verify that termination cascaded to it before the sequencer
/// returned.
fn trapping_server(log: &Path, pidfile: &Path) -> String {
    format!(
        "echo $$ > {pid}; trap 'echo term >> {log}; exit 0' TERM; echo server >> {log}; while :; do sleep 0.1; done",
        log = log.display(),
        pid = pidfile.display()
    )
}

#[tokio::test]
async fn idling_blocks_without_a_shutdown_request() {
    let dir = tempfile::tempdir().unwrap();
    let log = marker_log(&dir);
    let pidfile = dir.path().join("server.pid");

    let p = plan(
        trapping_server(&log, &pidfile),
        "true".into(),
        format!("echo run >> {}", log.display()),
        Duration::ZERO,
    );

    let (tx, rx) = mpsc::channel(16);
    let seq = Sequencer::new(p, rx, tx.clone());
    let mut handle = tokio::spawn(seq.run());

    // With a zero delay the sequencer reaches idle almost immediately.
    let started = Instant::now();
    wait_for_marker(&log, "run", Duration::from_secs(5)).await;
    assert!(started.elapsed() < Duration::from_secs(2));

    // Absent a shutdown request, run() must not return.
    let still_blocked = tokio::time::timeout(Duration::from_secs(2), &mut handle).await;
    assert!(still_blocked.is_err(), "sequencer returned without a signal");

    tx.send(SequencerEvent::ShutdownRequested).await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("sequencer did not stop after shutdown request");
    result.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_terminates_the_server_before_returning() {
    let dir = tempfile::tempdir().unwrap();
    let log = marker_log(&dir);
    let pidfile = dir.path().join("server.pid");

    let p = plan(
        trapping_server(&log, &pidfile),
        "true".into(),
        format!("echo run >> {}", log.display()),
        Duration::ZERO,
    );

    let (tx, rx) = mpsc::channel(16);
    let seq = Sequencer::new(p, rx, tx.clone());
    let handle = tokio::spawn(seq.run());

    wait_for_marker(&log, "run", Duration::from_secs(5)).await;
    tx.send(SequencerEvent::ShutdownRequested).await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("sequencer did not stop after shutdown request");
    result.unwrap().unwrap();

    // The trap wrote its marker before the sequencer finished, so the
    // termination request reached the server first.
    assert!(
        log_lines(&log).iter().any(|l| l == "term"),
        "server never received the termination request"
    );

    // And the server process itself is gone.
    let pid: u32 = std::fs::read_to_string(&pidfile)
        .expect("server never wrote its pidfile")
        .trim()
        .parse()
        .unwrap();
    assert!(!is_process_alive(pid), "server process survived shutdown");
}

#[tokio::test]
async fn server_death_while_idling_keeps_the_sequencer_up() {
    let dir = tempfile::tempdir().unwrap();
    let log = marker_log(&dir);

    // Server that exits on its own shortly after bring-up completes.
    let p = plan(
        format!("echo server >> {}; sleep 0.3", log.display()),
        "true".into(),
        format!("echo run >> {}", log.display()),
        Duration::ZERO,
    );

    let (tx, rx) = mpsc::channel(16);
    let seq = Sequencer::new(p, rx, tx.clone());
    let mut handle = tokio::spawn(seq.run());

    wait_for_marker(&log, "run", Duration::from_secs(5)).await;

    // Give the server time to die, then check the sequencer is still blocked.
    let still_blocked = tokio::time::timeout(Duration::from_secs(2), &mut handle).await;
    assert!(
        still_blocked.is_err(),
        "sequencer exited when the server died while idling"
    );

    tx.send(SequencerEvent::ShutdownRequested).await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("sequencer did not stop after shutdown request");
    result.unwrap().unwrap();
}
