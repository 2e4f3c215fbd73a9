// src/sequencer/runtime.rs

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::errors::SequencerError;
use crate::exec::{run_step, spawn_server, terminate_server, ServerHandle};
use crate::sequencer::plan::Plan;
use crate::sequencer::state::{Phase, PhaseTracker};

/// Events sent into the sequencer from probes, stdout monitors, or the
/// signal listener.
///
/// The idea is that:
/// - the TCP probe and the stdout pattern monitor send `ServerReady`
/// - the TCP probe sends `ProbeExhausted` when its attempt budget runs out
/// - the signal listener sends `ShutdownRequested`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerEvent {
    ServerReady,
    ProbeExhausted,
    ShutdownRequested,
}

/// Outcome of the readiness wait.
enum WaitOutcome {
    Proceed,
    Shutdown,
}

/// Outcome of running a synchronous step while listening for shutdown.
enum StepResult {
    Finished(std::io::Result<i32>),
    Shutdown,
}

/// The bring-up sequencer.
///
/// Responsibilities:
/// - Spawn the background server exactly once, before anything else.
/// - Honour the full readiness delay (plus probe/pattern, when configured)
///   before the setup step.
/// - Run the setup and foreground steps synchronously, logging non-zero
///   exits without treating them as fatal.
/// - Block in `Idling` until a shutdown request, then cascade termination to
///   the server before returning.
pub struct Sequencer {
    plan: Plan,
    phase: PhaseTracker,
    events_rx: mpsc::Receiver<SequencerEvent>,
    events_tx: mpsc::Sender<SequencerEvent>,
}

impl Sequencer {
    pub fn new(
        plan: Plan,
        events_rx: mpsc::Receiver<SequencerEvent>,
        events_tx: mpsc::Sender<SequencerEvent>,
    ) -> Self {
        Self {
            plan,
            phase: PhaseTracker::new(),
            events_rx,
            events_tx,
        }
    }

    /// Run the full bring-up sequence to termination.
    ///
    /// Returns `Ok(())` only on normal, signal-driven termination (after the
    /// server has been sent its termination request). A server that cannot be
    /// spawned, or that dies during the readiness wait, is fatal.
    pub async fn run(mut self) -> Result<(), SequencerError> {
        info!("sequencer started");

        self.phase.advance(Phase::Launching);
        let mut handle = spawn_server(
            &self.plan.server_cmd,
            &self.plan.bind,
            self.plan.ready_pattern.clone(),
            self.events_tx.clone(),
        )?;

        self.phase.advance(Phase::WaitingReady);
        match self.wait_ready(&mut handle).await? {
            WaitOutcome::Proceed => {}
            WaitOutcome::Shutdown => return self.terminate(&mut handle, false).await,
        }

        self.phase.advance(Phase::SettingUp);
        let setup_cmd = self.plan.setup_cmd.clone();
        match self.run_step_or_shutdown("setup", setup_cmd).await {
            StepResult::Shutdown => return self.terminate(&mut handle, false).await,
            StepResult::Finished(Err(source)) => {
                error!(error = %source, "setup step failed to launch");
                terminate_server(&mut handle, self.plan.term_grace).await;
                return Err(SequencerError::SetupFailure { source });
            }
            StepResult::Finished(Ok(code)) if code != 0 => {
                warn!(exit_code = code, "setup step exited non-zero, continuing");
            }
            StepResult::Finished(Ok(_)) => {}
        }

        self.phase.advance(Phase::RunningForeground);
        let run_cmd = self.plan.run_cmd.clone();
        match self.run_step_or_shutdown("run", run_cmd).await {
            StepResult::Shutdown => return self.terminate(&mut handle, false).await,
            StepResult::Finished(Err(err)) => {
                warn!(error = %err, "foreground step failed to launch");
            }
            StepResult::Finished(Ok(code)) if code != 0 => {
                warn!(exit_code = code, "foreground step exited non-zero");
            }
            StepResult::Finished(Ok(_)) => {}
        }

        self.phase.advance(Phase::Idling);
        let server_gone = self.idle(&mut handle).await;

        self.terminate(&mut handle, server_gone).await
    }

    /// Wait until the server may be assumed ready.
    ///
    /// The fixed delay is a floor that always elapses in full. When a probe
    /// or stdout pattern is configured, readiness additionally requires a
    /// `ServerReady` event; an exhausted probe budget downgrades to the
    /// source behaviour of proceeding optimistically, with a warning.
    async fn wait_ready(
        &mut self,
        handle: &mut ServerHandle,
    ) -> Result<WaitOutcome, SequencerError> {
        let needs_signal = self.plan.probe || self.plan.ready_pattern.is_some();

        if self.plan.probe {
            spawn_probe(
                self.plan.bind.clone(),
                self.plan.probe_attempts,
                self.plan.probe_backoff,
                self.events_tx.clone(),
            );
        }

        let delay = sleep(self.plan.ready_delay);
        tokio::pin!(delay);

        let mut delay_elapsed = false;
        let mut ready = !needs_signal;

        loop {
            if delay_elapsed && ready {
                info!("server assumed ready, proceeding to setup");
                return Ok(WaitOutcome::Proceed);
            }

            tokio::select! {
                _ = &mut delay, if !delay_elapsed => {
                    delay_elapsed = true;
                    debug!("readiness delay elapsed");
                }
                event = self.events_rx.recv() => match event {
                    Some(SequencerEvent::ServerReady) => {
                        info!("server signalled ready");
                        ready = true;
                    }
                    Some(SequencerEvent::ProbeExhausted) => {
                        warn!("readiness probe exhausted its attempts, proceeding optimistically");
                        ready = true;
                    }
                    Some(SequencerEvent::ShutdownRequested) | None => {
                        info!("shutdown requested during readiness wait");
                        return Ok(WaitOutcome::Shutdown);
                    }
                },
                status = handle.child.wait() => {
                    let code = status.ok().and_then(|s| s.code()).unwrap_or(-1);
                    error!(code, "background server exited during bring-up");
                    return Err(SequencerError::ServerExited { code });
                }
            }
        }
    }

    /// Run a synchronous step while staying responsive to shutdown requests.
    ///
    /// The step child has `kill_on_drop`, so abandoning it on shutdown reaps
    /// the process.
    async fn run_step_or_shutdown(&mut self, name: &'static str, cmd: String) -> StepResult {
        let step = run_step(name, &cmd);
        tokio::pin!(step);

        loop {
            tokio::select! {
                res = &mut step => return StepResult::Finished(res),
                event = self.events_rx.recv() => match event {
                    Some(SequencerEvent::ShutdownRequested) | None => {
                        info!(step = %name, "shutdown requested mid-step, abandoning step");
                        return StepResult::Shutdown;
                    }
                    // Late readiness/probe events are harmless here.
                    Some(_) => {}
                },
            }
        }
    }

    /// Block until a shutdown request arrives.
    ///
    /// A server that dies while idling is logged but does not end the
    /// sequencer; the container stays alive either way. Returns whether the
    /// server already exited (so termination can skip signalling it).
    async fn idle(&mut self, handle: &mut ServerHandle) -> bool {
        info!("bring-up complete, idling until termination signal");

        let mut server_gone = false;
        loop {
            if server_gone {
                match self.events_rx.recv().await {
                    Some(SequencerEvent::ShutdownRequested) | None => return server_gone,
                    Some(_) => continue,
                }
            }

            tokio::select! {
                event = self.events_rx.recv() => match event {
                    Some(SequencerEvent::ShutdownRequested) | None => return server_gone,
                    Some(_) => {}
                },
                status = handle.child.wait() => {
                    let code = status.ok().and_then(|s| s.code()).unwrap_or(-1);
                    error!(
                        code,
                        "background server exited while idling; staying up to keep the container alive"
                    );
                    server_gone = true;
                }
            }
        }
    }

    /// Cascade termination to the server, then finish.
    async fn terminate(
        &mut self,
        handle: &mut ServerHandle,
        server_gone: bool,
    ) -> Result<(), SequencerError> {
        self.phase.advance(Phase::Terminating);

        if !server_gone {
            terminate_server(handle, self.plan.term_grace).await;
        }

        self.phase.advance(Phase::Terminated);
        info!("sequencer terminated");
        Ok(())
    }
}

/// TCP readiness probe: connect to the bind address with bounded retries.
///
/// Emits `ServerReady` on the first successful connect, or `ProbeExhausted`
/// once the attempt budget is spent.
fn spawn_probe(
    addr: String,
    attempts: u32,
    backoff: Duration,
    events_tx: mpsc::Sender<SequencerEvent>,
) {
    tokio::spawn(async move {
        for attempt in 1..=attempts {
            match TcpStream::connect(addr.as_str()).await {
                Ok(_) => {
                    debug!(addr = %addr, attempt, "readiness probe connected");
                    let _ = events_tx.send(SequencerEvent::ServerReady).await;
                    return;
                }
                Err(err) => {
                    debug!(addr = %addr, attempt, error = %err, "readiness probe attempt failed");
                }
            }
            sleep(backoff).await;
        }
        let _ = events_tx.send(SequencerEvent::ProbeExhausted).await;
    });
}
