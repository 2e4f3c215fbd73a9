// src/sequencer/plan.rs

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use regex::Regex;

use crate::config::model::ConfigFile;
use crate::exec::parse_duration;

/// Fully resolved bring-up plan.
///
/// This is the validated, ready-to-execute form of [`ConfigFile`]: durations
/// parsed, the ready pattern compiled, and `{task}` / `{definition}` /
/// `{bind}` placeholders expanded into the command strings.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Shell command that starts the background server.
    pub server_cmd: String,
    /// Bind address exported to the server as `MODELBOOT_BIND`.
    pub bind: String,
    /// One-time registration command.
    pub setup_cmd: String,
    /// Foreground command.
    pub run_cmd: String,
    /// Fixed readiness delay; always honoured in full before setup.
    pub ready_delay: Duration,
    /// Whether to TCP-probe the bind address after spawning the server.
    pub probe: bool,
    pub probe_attempts: u32,
    pub probe_backoff: Duration,
    /// Optional stdout pattern that marks the server ready.
    pub ready_pattern: Option<Regex>,
    /// SIGTERM-to-SIGKILL grace period on shutdown.
    pub term_grace: Duration,
}

impl Plan {
    /// Resolve a validated config into an executable plan.
    pub fn from_config(cfg: &ConfigFile) -> Result<Plan> {
        let ready_delay = parse_duration(&cfg.ready.delay)
            .map_err(|e| anyhow!(e))
            .context("invalid [ready].delay")?;
        let probe_backoff = parse_duration(&cfg.ready.backoff)
            .map_err(|e| anyhow!(e))
            .context("invalid [ready].backoff")?;
        let term_grace = parse_duration(&cfg.server.term_grace)
            .map_err(|e| anyhow!(e))
            .context("invalid [server].term_grace")?;

        let ready_pattern = cfg
            .ready
            .pattern
            .as_ref()
            .map(|p| {
                Regex::new(p).with_context(|| format!("invalid [ready].pattern regex '{}'", p))
            })
            .transpose()?;

        Ok(Plan {
            server_cmd: expand_placeholders(&cfg.server.cmd, cfg),
            bind: cfg.server.bind.clone(),
            setup_cmd: expand_placeholders(&cfg.setup.cmd, cfg),
            run_cmd: expand_placeholders(&cfg.run.cmd, cfg),
            ready_delay,
            probe: cfg.ready.probe,
            probe_attempts: cfg.ready.attempts,
            probe_backoff,
            ready_pattern,
            term_grace,
        })
    }
}

/// Expand `{task}`, `{definition}` and `{bind}` in a command string.
fn expand_placeholders(cmd: &str, cfg: &ConfigFile) -> String {
    cmd.replace("{task}", &cfg.task)
        .replace("{definition}", &cfg.definition)
        .replace("{bind}", &cfg.server.bind)
}
