// src/config/model.rs

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// A full example:
///
/// ```toml
/// task = "summarizer"
/// definition = "/models/Summarizer.def"
///
/// [server]
/// cmd = "modelserved"
/// bind = "127.0.0.1:8080"
///
/// [setup]
/// cmd = "modelctl create {task} -f {definition}"
///
/// [run]
/// cmd = "modelctl run {task}"
///
/// [ready]
/// delay = "5s"
/// probe = true
/// attempts = 10
/// backoff = "500ms"
/// ```
///
/// All sections are optional in the file; every field can also come from a
/// `MODELBOOT_*` environment variable (see `loader.rs`), which is the only
/// configuration surface in container deployments. Commands may contain
/// `{task}`, `{definition}` and `{bind}` placeholders, expanded before
/// execution.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    /// Name of the model/task to register and run. Env: `MODELBOOT_TASK`.
    #[serde(default)]
    pub task: String,

    /// Path to the model definition file. Env: `MODELBOOT_DEFINITION`.
    #[serde(default)]
    pub definition: String,

    /// Background server command and bind address from `[server]`.
    #[serde(default)]
    pub server: ServerSection,

    /// One-time registration command from `[setup]`.
    #[serde(default)]
    pub setup: StepSection,

    /// Foreground command from `[run]`.
    #[serde(default)]
    pub run: StepSection,

    /// Readiness behaviour from `[ready]`.
    #[serde(default)]
    pub ready: ReadySection,
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Shell command that starts the background server.
    /// Env: `MODELBOOT_SERVER_CMD`.
    #[serde(default)]
    pub cmd: String,

    /// Bind address handed to the server via the `MODELBOOT_BIND` environment
    /// variable (and available as `{bind}` in commands).
    /// Env: `MODELBOOT_BIND`.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// How long to wait after SIGTERM before force-killing the server on
    /// shutdown. Env: `MODELBOOT_TERM_GRACE`.
    #[serde(default = "default_term_grace")]
    pub term_grace: String,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_term_grace() -> String {
    "5s".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            cmd: String::new(),
            bind: default_bind(),
            term_grace: default_term_grace(),
        }
    }
}

/// `[setup]` / `[run]` sections: a single shell command.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StepSection {
    /// Shell command for this step.
    /// Env: `MODELBOOT_SETUP_CMD` / `MODELBOOT_RUN_CMD`.
    #[serde(default)]
    pub cmd: String,
}

/// `[ready]` section.
///
/// The fixed `delay` is always honoured in full before the setup step runs.
/// The probe and stdout pattern only *extend* the wait: when either is
/// configured, the sequencer keeps waiting past the delay until the server
/// signals readiness (or the probe budget is exhausted, in which case it
/// proceeds optimistically with a warning).
#[derive(Debug, Clone, Deserialize)]
pub struct ReadySection {
    /// Fixed readiness delay, e.g. "5s" or "250ms".
    /// Env: `MODELBOOT_READY_DELAY`.
    #[serde(default = "default_ready_delay")]
    pub delay: String,

    /// Enable a TCP connect probe against the bind address.
    /// Env: `MODELBOOT_READY_PROBE` ("1"/"true").
    #[serde(default)]
    pub probe: bool,

    /// Regex matched against server stdout lines; a match marks the server
    /// ready. Env: `MODELBOOT_READY_PATTERN`.
    #[serde(default)]
    pub pattern: Option<String>,

    /// Maximum number of probe attempts.
    #[serde(default = "default_probe_attempts")]
    pub attempts: u32,

    /// Pause between probe attempts.
    #[serde(default = "default_probe_backoff")]
    pub backoff: String,
}

fn default_ready_delay() -> String {
    "5s".to_string()
}

fn default_probe_attempts() -> u32 {
    10
}

fn default_probe_backoff() -> String {
    "500ms".to_string()
}

impl Default for ReadySection {
    fn default() -> Self {
        Self {
            delay: default_ready_delay(),
            probe: false,
            pattern: None,
            attempts: default_probe_attempts(),
            backoff: default_probe_backoff(),
        }
    }
}
