// src/errors.rs

//! Fatal error taxonomy for the bring-up sequence.
//!
//! Only failures that should abort the sequencer live here. Non-zero exit
//! codes from the setup and foreground steps are *not* fatal: the sequencer
//! logs them at warn and carries on, which matches the behaviour of the
//! entrypoint scripts this tool replaces (where those failures were silently
//! swallowed — here they are at least visible).

use thiserror::Error;

/// Errors that abort the bring-up sequence with a non-zero exit.
#[derive(Debug, Error)]
pub enum SequencerError {
    /// The background server process could not be spawned at all.
    #[error("failed to spawn background server: {source}")]
    SpawnFailure {
        #[source]
        source: std::io::Error,
    },

    /// The background server exited before bring-up finished.
    ///
    /// A server that dies during the readiness wait cannot accept the setup
    /// request, so the sequencer fails fast instead of proceeding.
    #[error("background server exited during bring-up with code {code}")]
    ServerExited { code: i32 },

    /// The setup step could not be launched (command not runnable).
    ///
    /// Distinct from the setup command *running and failing*, which is only
    /// logged.
    #[error("failed to launch setup step: {source}")]
    SetupFailure {
        #[source]
        source: std::io::Error,
    },
}

pub use anyhow::Result;
