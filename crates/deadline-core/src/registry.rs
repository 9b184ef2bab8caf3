//! Persistent (profile, group) → date registry.
//!
//! Every operation loads the document fresh, normalizes it through
//! [`migrate_legacy_shape`], and writes the whole document back in one save.
//! Profiles other than the one named in a call are carried through untouched.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{ConfigDocument, migrate_legacy_shape};
use crate::error::DeadlineError;
use crate::model::{DeadlineEntry, ReportMode, format_date};
use crate::store::ConfigStore;

/// Deadline registry over a [`ConfigStore`].
#[derive(Debug)]
pub struct Registry<S> {
    store: S,
}

impl<S: ConfigStore> Registry<S> {
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Load and normalize the document, persisting the migration if one was
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Persistence`] if the store fails and
    /// [`DeadlineError::ConfigShape`] if the document cannot be normalized.
    pub fn load(&self) -> Result<ConfigDocument, DeadlineError> {
        let migration = migrate_legacy_shape(self.store.load()?)?;
        if !migration.changed {
            return ConfigDocument::from_value(migration.document);
        }

        // Re-read under the store's lock; another writer may have migrated
        // or edited the document since the first read.
        let mut migrated = Value::Null;
        self.store.update(&mut |raw: &mut Value| {
            let current = migrate_legacy_shape(raw.take())?;
            migrated = current.document.clone();
            *raw = current.document;
            Ok(())
        })?;
        info!("migrated deadline config to current shape");
        ConfigDocument::from_value(migrated)
    }

    /// Insert or replace the date for (`profile`, `group`). `None` records the
    /// group with no deadline enforced.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Persistence`] if the store fails; nothing is
    /// written in that case.
    pub fn add(
        &self,
        profile: &str,
        group: &str,
        date: Option<NaiveDate>,
    ) -> Result<(), DeadlineError> {
        self.add_all(profile, &[group.to_string()], date)
    }

    /// Insert or replace the same date for every group in `groups` in a
    /// single write.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Persistence`] if the store fails; none of the
    /// groups are written in that case.
    pub fn add_all(
        &self,
        profile: &str,
        groups: &[String],
        date: Option<NaiveDate>,
    ) -> Result<(), DeadlineError> {
        let raw = date.map(format_date).unwrap_or_default();
        self.edit(|doc| {
            let entries = doc.deadlines.entry(profile.to_string()).or_default();
            for group in groups {
                entries.insert(group.clone(), raw.clone());
            }
            Ok(())
        })?;
        debug!(profile, groups = groups.len(), date = %raw, "deadlines added");
        Ok(())
    }

    /// Whether (`profile`, `group`) has an entry, dated or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be loaded.
    pub fn contains(&self, profile: &str, group: &str) -> Result<bool, DeadlineError> {
        Ok(self
            .load()?
            .deadlines
            .get(profile)
            .is_some_and(|groups| groups.contains_key(group)))
    }

    /// Delete the entry for (`profile`, `group`).
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::NotFound`] when there is no such entry, and
    /// [`DeadlineError::Persistence`] if the store fails.
    pub fn remove(&self, profile: &str, group: &str) -> Result<(), DeadlineError> {
        self.edit(|doc| {
            let removed = doc
                .deadlines
                .get_mut(profile)
                .and_then(|groups| groups.remove(group));
            if removed.is_none() {
                return Err(DeadlineError::NotFound {
                    profile: profile.to_string(),
                    group: group.to_string(),
                });
            }
            Ok(())
        })?;
        debug!(profile, group, "deadline removed");
        Ok(())
    }

    /// Entries for `profile`, ordered by group name.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Persistence`] or [`DeadlineError::ConfigShape`]
    /// if the document cannot be loaded.
    pub fn list_for_profile(&self, profile: &str) -> Result<Vec<DeadlineEntry>, DeadlineError> {
        Ok(self.load()?.entries_for(profile))
    }

    /// Stored report mode preference.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be loaded.
    pub fn report_mode(&self) -> Result<ReportMode, DeadlineError> {
        Ok(self.load()?.report_mode)
    }

    /// Persist the report mode preference.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Persistence`] if the store fails.
    pub fn set_report_mode(&self, mode: ReportMode) -> Result<(), DeadlineError> {
        self.edit(|doc| {
            doc.report_mode = mode;
            Ok(())
        })
    }

    fn edit(
        &self,
        mut apply: impl FnMut(&mut ConfigDocument) -> Result<(), DeadlineError>,
    ) -> Result<(), DeadlineError> {
        self.store.update(&mut |raw: &mut Value| {
            let migration = migrate_legacy_shape(raw.take())?;
            let mut doc = ConfigDocument::from_value(migration.document)?;
            apply(&mut doc)?;
            *raw = doc.to_value()?;
            Ok(())
        })
    }
}
