//! Resolution of the per-invocation inputs that come from flags, environment,
//! and the settings file.
//!
//! Profile chain: `--profile` flag > `DEADLINE_PROFILE` env > settings `profile`
//! > `USER` env > `"default"`.
//! Settings path: `--config` flag > `DEADLINE_CONFIG` env > `<config_dir>/deadline/config.toml`.
//! Today: `DEADLINE_TODAY` env (`YYYY-MM-DD`) > system clock.

use chrono::{DateTime, Local, NaiveDate};
use deadline_core::clock::{Clock, FixedClock, SystemClock};
use deadline_core::config::default_settings_path;
use deadline_core::model::DATE_FORMAT;
use std::env;
use std::path::PathBuf;

/// Profile used when nothing else names one.
pub const DEFAULT_PROFILE: &str = "default";

/// Environment reader trait for dependency injection in tests.
pub trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
}

/// Real environment reader.
pub struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// Resolve the active profile following the chain in the module docs.
pub fn resolve_profile_with(
    cli_flag: Option<&str>,
    settings_profile: Option<&str>,
    env: &dyn EnvReader,
) -> String {
    if let Some(profile) = cli_flag.filter(|p| !p.is_empty()) {
        return profile.to_string();
    }

    if let Some(val) = env.get("DEADLINE_PROFILE") {
        return val;
    }

    if let Some(profile) = settings_profile.filter(|p| !p.is_empty()) {
        return profile.to_string();
    }

    env.get("USER")
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
}

/// Resolve the settings file path; `None` when no config directory exists.
pub fn resolve_settings_path_with(cli_flag: Option<PathBuf>, env: &dyn EnvReader) -> Option<PathBuf> {
    cli_flag
        .or_else(|| env.get("DEADLINE_CONFIG").map(PathBuf::from))
        .or_else(default_settings_path)
}

/// Error for a malformed `DEADLINE_TODAY` override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodayOverrideError {
    pub value: String,
}

impl std::fmt::Display for TodayOverrideError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DEADLINE_TODAY must be YYYY-MM-DD, got {:?}", self.value)
    }
}

impl std::error::Error for TodayOverrideError {}

/// Instant the run is computed against.
pub fn resolve_now_with(env: &dyn EnvReader) -> Result<DateTime<Local>, TodayOverrideError> {
    let Some(raw) = env.get("DEADLINE_TODAY") else {
        return Ok(SystemClock.now());
    };
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map(|date| FixedClock::at_noon(date).now())
        .map_err(|_| TodayOverrideError { value: raw })
}
