// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the external commands in
//! the bring-up plan, using `tokio::process::Command`, and reporting back to
//! the sequencer via `SequencerEvent`s.
//!
//! - [`server`] spawns and terminates the background server process and owns
//!   the stdout/stderr drains (including the optional ready-pattern match).
//! - [`step`] runs the synchronous setup and foreground steps.

pub mod server;
pub mod step;

pub use server::{spawn_server, terminate_server, ServerHandle};
#[cfg(unix)]
pub use server::is_process_alive;
pub use step::run_step;

use std::time::Duration;

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
///
/// This is intentionally minimal; it covers what readiness delays and
/// termination grace periods realistically look like.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => value
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration '{}' is too large", s)),
        "h" => value
            .checked_mul(60 * 60)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration '{}' is too large", s)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn zero_is_valid() {
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("5d").is_err());
    }

    #[test]
    fn rejects_overflowing_values() {
        assert!(parse_duration("600000000000000000m").is_err());
        assert!(parse_duration("18446744073709551615h").is_err());
    }
}
