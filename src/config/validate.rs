// src/config/validate.rs

use anyhow::{anyhow, Context, Result};
use regex::Regex;

use crate::config::model::ConfigFile;
use crate::exec::parse_duration;

/// Run basic semantic validation against a loaded configuration.
///
/// This checks:
/// - `[server].cmd`, `[setup].cmd` and `[run].cmd` are non-empty
/// - `task` and `definition` are non-empty
/// - `[ready].delay`, `[ready].backoff` and `[server].term_grace` parse as
///   durations
/// - `[ready].pattern` compiles as a regex (when set)
/// - `[ready].attempts >= 1` and a non-empty bind address when the probe is
///   enabled
///
/// It does **not** check that the commands are resolvable in the execution
/// environment; that only surfaces when they are spawned.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    ensure_commands(cfg)?;
    ensure_identifiers(cfg)?;
    validate_durations(cfg)?;
    validate_readiness(cfg)?;
    Ok(())
}

fn ensure_commands(cfg: &ConfigFile) -> Result<()> {
    if cfg.server.cmd.trim().is_empty() {
        return Err(anyhow!(
            "[server].cmd (or MODELBOOT_SERVER_CMD) must be set"
        ));
    }
    if cfg.setup.cmd.trim().is_empty() {
        return Err(anyhow!("[setup].cmd (or MODELBOOT_SETUP_CMD) must be set"));
    }
    if cfg.run.cmd.trim().is_empty() {
        return Err(anyhow!("[run].cmd (or MODELBOOT_RUN_CMD) must be set"));
    }
    Ok(())
}

fn ensure_identifiers(cfg: &ConfigFile) -> Result<()> {
    if cfg.task.trim().is_empty() {
        return Err(anyhow!("task (or MODELBOOT_TASK) must be set"));
    }
    if cfg.definition.trim().is_empty() {
        return Err(anyhow!("definition (or MODELBOOT_DEFINITION) must be set"));
    }
    Ok(())
}

fn validate_durations(cfg: &ConfigFile) -> Result<()> {
    parse_duration(&cfg.ready.delay)
        .map_err(|e| anyhow!(e))
        .context("invalid [ready].delay")?;
    parse_duration(&cfg.ready.backoff)
        .map_err(|e| anyhow!(e))
        .context("invalid [ready].backoff")?;
    parse_duration(&cfg.server.term_grace)
        .map_err(|e| anyhow!(e))
        .context("invalid [server].term_grace")?;
    Ok(())
}

fn validate_readiness(cfg: &ConfigFile) -> Result<()> {
    if let Some(ref pattern) = cfg.ready.pattern {
        Regex::new(pattern)
            .with_context(|| format!("invalid [ready].pattern regex '{}'", pattern))?;
    }

    if cfg.ready.probe {
        if cfg.ready.attempts == 0 {
            return Err(anyhow!("[ready].attempts must be >= 1 (got 0)"));
        }
        if cfg.server.bind.trim().is_empty() {
            return Err(anyhow!(
                "[ready].probe requires a [server].bind address to connect to"
            ));
        }
    }

    Ok(())
}
