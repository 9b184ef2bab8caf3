pub mod add;
pub mod completions;
pub mod config;
pub mod list;
pub mod process;
pub mod remove;

use anyhow::{Context as _, Result, anyhow};
use chrono::{DateTime, Local, NaiveDate};
use deadline_core::Registry;
use deadline_core::collection::Collection;
use deadline_core::config::{UserSettings, load_user_settings};
use deadline_core::store::JsonFileStore;
use std::path::PathBuf;
use tracing::debug;

use crate::output::{CliError, OutputMode, fail, render_error, resolve_output_mode};
use crate::resolve::{EnvReader, RealEnv, resolve_now_with, resolve_profile_with, resolve_settings_path_with};

/// Global flags that feed [`RunContext::resolve`].
#[derive(Debug, Default)]
pub struct GlobalArgs<'a> {
    pub profile: Option<&'a str>,
    pub config: Option<PathBuf>,
    pub collection: Option<PathBuf>,
    pub format: Option<OutputMode>,
    pub json: bool,
}

/// Everything a command needs, resolved once per invocation.
#[derive(Debug)]
pub struct RunContext {
    pub settings_path: Option<PathBuf>,
    pub settings: UserSettings,
    pub profile: String,
    pub output: OutputMode,
    pub now: DateTime<Local>,
    collection_flag: Option<PathBuf>,
}

impl RunContext {
    pub fn resolve(globals: GlobalArgs<'_>) -> Result<Self> {
        Self::resolve_with(globals, &RealEnv)
    }

    fn resolve_with(globals: GlobalArgs<'_>, env: &dyn EnvReader) -> Result<Self> {
        let early_output = resolve_output_mode(globals.format, globals.json, None);
        let settings_path = resolve_settings_path_with(globals.config, env);
        let settings = match &settings_path {
            Some(path) => load_user_settings(path).map_err(|err| fail(early_output, err))?,
            None => UserSettings::default(),
        };
        let output = resolve_output_mode(globals.format, globals.json, settings.output.as_deref());
        let profile = resolve_profile_with(globals.profile, settings.profile.as_deref(), env);
        let now = match resolve_now_with(env) {
            Ok(now) => now,
            Err(err) => {
                render_error(
                    output,
                    &CliError::with_details(
                        err.to_string(),
                        "Unset DEADLINE_TODAY or use the YYYY-MM-DD format",
                        "invalid_today",
                    ),
                )?;
                return Err(anyhow!(err));
            }
        };

        debug!(
            profile = %profile,
            settings = ?settings_path,
            today = %now.date_naive(),
            "resolved run context"
        );
        Ok(Self {
            settings_path,
            settings,
            profile,
            output,
            now,
            collection_flag: globals.collection,
        })
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    pub fn registry_path(&self) -> Option<PathBuf> {
        self.settings.registry_path()
    }

    pub fn collection_path(&self) -> Option<PathBuf> {
        self.collection_flag
            .clone()
            .or_else(|| self.settings.collection.clone())
    }

    /// Registry backed by the JSON document on disk.
    pub fn registry(&self) -> Result<Registry<JsonFileStore>> {
        let Some(path) = self.registry_path() else {
            render_error(
                self.output,
                &CliError::with_details(
                    "No location for the deadline registry",
                    "Set `registry` in config.toml",
                    "missing_registry",
                ),
            )?;
            return Err(anyhow!("no registry path could be determined"));
        };
        Ok(Registry::new(JsonFileStore::new(path)))
    }

    /// Open the review collection named by `--collection` or settings.
    pub fn open_collection(&self) -> Result<Collection> {
        let Some(path) = self.collection_path() else {
            render_error(
                self.output,
                &CliError::with_details(
                    "No review collection configured",
                    "Pass --collection or set `collection` in config.toml",
                    "missing_collection",
                ),
            )?;
            return Err(anyhow!("no collection configured"));
        };
        Collection::open(&path, self.now)
            .map_err(|err| fail(self.output, err))
            .with_context(|| format!("opening collection {}", path.display()))
    }
}
