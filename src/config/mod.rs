// src/config/mod.rs

//! Configuration loading and validation for modelboot.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and overlay `MODELBOOT_*` environment
//!   variables (`loader.rs`).
//! - Validate basic invariants like non-empty commands and parseable
//!   durations (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{ConfigFile, ReadySection, ServerSection, StepSection};
pub use validate::validate_config;
