// src/sequencer/mod.rs

//! Bring-up orchestration for modelboot.
//!
//! This module ties together:
//! - the resolved bring-up plan (commands, delays, probe settings)
//! - the phase state machine that tracks bring-up progress
//! - the main runtime that reacts to:
//!   - readiness signals (probe / stdout pattern)
//!   - background server exits
//!   - shutdown requests from the signal listener

pub mod plan;
pub mod runtime;
pub mod state;

pub use plan::Plan;
pub use runtime::{Sequencer, SequencerEvent};
pub use state::{Phase, PhaseTracker};
