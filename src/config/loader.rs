// src/config/loader.rs

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::model::ConfigFile;
use crate::config::validate::validate_config;

/// Load a configuration file from a given path and return the raw `ConfigFile`.
///
/// The file is optional: in container deployments the whole configuration
/// usually arrives via environment variables, so a missing file simply yields
/// the defaults. This only performs TOML deserialization; it does **not**
/// apply environment overrides or semantic validation. Use
/// [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(?path, "no config file found, starting from defaults");
        return Ok(ConfigFile::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {:?}", path))?;

    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("parsing TOML config from {:?}", path))?;

    Ok(config)
}

/// Load a configuration file from path, overlay `MODELBOOT_*` environment
/// variables, and run basic validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML (if the file exists).
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Overlays environment variables (they win over the file).
/// - Checks for non-empty commands, parseable durations, valid regexes.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let mut config = load_from_path(&path)?;
    apply_env_overrides(&mut config);
    validate_config(&config)?;
    Ok(config)
}

/// Overlay `MODELBOOT_*` environment variables onto a loaded config.
///
/// Empty values are treated as unset so that e.g. `MODELBOOT_TASK=""` in a
/// container spec does not clobber a file-provided value.
pub fn apply_env_overrides(config: &mut ConfigFile) {
    if let Some(v) = env_string("MODELBOOT_TASK") {
        config.task = v;
    }
    if let Some(v) = env_string("MODELBOOT_DEFINITION") {
        config.definition = v;
    }
    if let Some(v) = env_string("MODELBOOT_SERVER_CMD") {
        config.server.cmd = v;
    }
    if let Some(v) = env_string("MODELBOOT_BIND") {
        config.server.bind = v;
    }
    if let Some(v) = env_string("MODELBOOT_TERM_GRACE") {
        config.server.term_grace = v;
    }
    if let Some(v) = env_string("MODELBOOT_SETUP_CMD") {
        config.setup.cmd = v;
    }
    if let Some(v) = env_string("MODELBOOT_RUN_CMD") {
        config.run.cmd = v;
    }
    if let Some(v) = env_string("MODELBOOT_READY_DELAY") {
        config.ready.delay = v;
    }
    if let Some(v) = env_string("MODELBOOT_READY_PROBE") {
        config.ready.probe = matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Some(v) = env_string("MODELBOOT_READY_PATTERN") {
        config.ready.pattern = Some(v);
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}
