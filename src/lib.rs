// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod sequencer;

use std::path::PathBuf;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::debug;

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::sequencer::{Plan, Sequencer, SequencerEvent};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (file + env overlay)
/// - plan resolution
/// - the termination-signal listener
/// - the bring-up sequencer
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    let plan = Plan::from_config(&cfg)?;

    if args.dry_run {
        print_dry_run(&cfg, &plan);
        return Ok(());
    }

    // Event channel: probe, stdout monitor and signal listener all feed the
    // sequencer through this.
    let (events_tx, events_rx) = mpsc::channel::<SequencerEvent>(16);

    // SIGTERM / SIGINT → graceful shutdown with cascaded server termination.
    spawn_signal_listener(events_tx.clone());

    let sequencer = Sequencer::new(plan, events_rx, events_tx);
    sequencer.run().await?;
    Ok(())
}

/// Listen for external termination signals and translate them into a
/// `ShutdownRequested` event.
fn spawn_signal_listener(tx: mpsc::Sender<SequencerEvent>) {
    tokio::spawn(async move {
        if let Err(e) = wait_for_signal().await {
            eprintln!("failed to listen for termination signals: {e}");
            return;
        }
        let _ = tx.send(SequencerEvent::ShutdownRequested).await;
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = term.recv() => {}
        _ = int.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Simple dry-run output: print the resolved bring-up plan.
fn print_dry_run(cfg: &ConfigFile, plan: &Plan) {
    println!("modelboot dry-run");
    println!("  task = {}", cfg.task);
    println!("  definition = {}", cfg.definition);
    println!();

    println!("  server.cmd: {}", plan.server_cmd);
    println!("  server.bind: {}", plan.bind);
    println!("  setup.cmd: {}", plan.setup_cmd);
    println!("  run.cmd: {}", plan.run_cmd);
    println!("  ready.delay: {:?}", plan.ready_delay);
    if plan.probe {
        println!(
            "  ready.probe: {} attempts, {:?} backoff",
            plan.probe_attempts, plan.probe_backoff
        );
    }
    if let Some(ref re) = plan.ready_pattern {
        println!("  ready.pattern: {}", re.as_str());
    }

    debug!("dry-run complete (no execution)");
}
