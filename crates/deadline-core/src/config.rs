use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{DeadlineError, ErrorCode};
use crate::model::{DeadlineEntry, ReportMode};

/// Top-level key grouping deadlines by profile.
pub const DEADLINES_KEY: &str = "deadlines";
/// Keys written by earlier releases for diagnostics; dropped on load.
pub const STRAY_KEYS: &[&str] = &["test"];

/// Per-profile map of group name to raw date string.
pub type ProfileDeadlines = BTreeMap<String, String>;

/// Typed view of the registry document.
///
/// Keys this crate does not know about are carried in `extra` so that a
/// load/save cycle never drops them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub deadlines: BTreeMap<String, ProfileDeadlines>,
    #[serde(rename = "oneOrMany", default)]
    pub report_mode: ReportMode,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfigDocument {
    /// Parse a normalized document.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::ConfigShape`] when the value does not match the
    /// expected shape.
    pub fn from_value(value: Value) -> Result<Self, DeadlineError> {
        serde_json::from_value(value).map_err(|err| DeadlineError::ConfigShape(err.to_string()))
    }

    /// Serialize back to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::ConfigShape`] if serialization fails.
    pub fn to_value(&self) -> Result<Value, DeadlineError> {
        serde_json::to_value(self).map_err(|err| DeadlineError::ConfigShape(err.to_string()))
    }

    /// Entries stored for `profile`, ordered by group name.
    #[must_use]
    pub fn entries_for(&self, profile: &str) -> Vec<DeadlineEntry> {
        self.deadlines
            .get(profile)
            .map(|groups| {
                groups
                    .iter()
                    .map(|(group, date)| DeadlineEntry {
                        profile: profile.to_string(),
                        group: group.clone(),
                        date: date.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Outcome of [`migrate_legacy_shape`].
#[derive(Debug, Clone, PartialEq)]
pub struct Migration {
    pub document: Value,
    /// True when the input differed from the normalized output.
    pub changed: bool,
}

/// Normalize a raw registry document into the current shape.
///
/// Older releases stored profile maps at the top level. When `"deadlines"`
/// is missing, every object-valued top-level key is moved under it while
/// scalar keys such as `"oneOrMany"` stay put. Stray diagnostic keys are
/// dropped in either shape. A `null` root (empty store) becomes `{}`.
///
/// Running this on its own output is a no-op with `changed == false`.
///
/// # Errors
///
/// Returns [`DeadlineError::ConfigShape`] when the root is neither an object
/// nor `null`, or when `"deadlines"` is present but not an object.
pub fn migrate_legacy_shape(raw: Value) -> Result<Migration, DeadlineError> {
    let mut root = match raw {
        Value::Object(map) => map,
        Value::Null => {
            return Ok(Migration {
                document: Value::Object(Map::new()),
                changed: false,
            });
        }
        other => {
            return Err(DeadlineError::ConfigShape(format!(
                "expected a JSON object at the top level, found {}",
                json_kind(&other)
            )));
        }
    };

    let mut changed = false;
    for key in STRAY_KEYS {
        changed |= root.remove(*key).is_some();
    }

    match root.get(DEADLINES_KEY) {
        Some(Value::Object(_)) => {}
        Some(other) => {
            return Err(DeadlineError::ConfigShape(format!(
                "\"{DEADLINES_KEY}\" must be an object, found {}",
                json_kind(other)
            )));
        }
        None => {
            let mut profiles = Map::new();
            let mut kept = Map::new();
            for (key, value) in root {
                if value.is_object() {
                    profiles.insert(key, value);
                } else {
                    kept.insert(key, value);
                }
            }
            kept.insert(DEADLINES_KEY.to_string(), Value::Object(profiles));
            root = kept;
            changed = true;
        }
    }

    Ok(Migration {
        document: Value::Object(root),
        changed,
    })
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// User settings read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Profile used when none is given on the command line.
    #[serde(default)]
    pub profile: Option<String>,
    /// Path of the review collection database.
    #[serde(default)]
    pub collection: Option<PathBuf>,
    /// Path of the registry document; defaults to [`default_registry_path`].
    #[serde(default)]
    pub registry: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub include_today: bool,
    #[serde(default)]
    pub output: Option<String>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            profile: None,
            collection: None,
            registry: None,
            include_today: default_true(),
            output: None,
        }
    }
}

impl UserSettings {
    /// Registry path from settings, or the per-user default.
    #[must_use]
    pub fn registry_path(&self) -> Option<PathBuf> {
        self.registry.clone().or_else(default_registry_path)
    }
}

/// `<config_dir>/deadline/config.toml`.
#[must_use]
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("deadline/config.toml"))
}

/// `<config_dir>/deadline/deadlines.json`.
#[must_use]
pub fn default_registry_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("deadline/deadlines.json"))
}

/// Load user settings from `path`. A missing file yields defaults.
///
/// # Errors
///
/// Returns [`DeadlineError::Persistence`] when the file cannot be read or
/// parsed.
pub fn load_user_settings(path: &Path) -> Result<UserSettings, DeadlineError> {
    if !path.exists() {
        return Ok(UserSettings::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|err| DeadlineError::persistence(path, ErrorCode::ConfigUnreadable, err))?;

    toml::from_str::<UserSettings>(&content)
        .map_err(|err| DeadlineError::persistence(path, ErrorCode::ConfigUnreadable, err))
}

const fn default_true() -> bool {
    true
}
