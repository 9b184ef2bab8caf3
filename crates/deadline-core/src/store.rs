//! Backing stores for the registry document.
//!
//! The registry only ever sees a [`ConfigStore`]: a loader and saver of one
//! JSON value. [`JsonFileStore`] is the on-disk store used by the CLI;
//! [`MemoryStore`] backs tests and embedders that persist elsewhere.

use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{DeadlineError, ErrorCode};
use crate::lock::{ConfigLock, DEFAULT_LOCK_TIMEOUT};

/// Load/save access to the raw registry document.
pub trait ConfigStore {
    /// Read the whole document. An absent document reads as `Value::Null`.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Persistence`] when the store is unreachable.
    fn load(&self) -> Result<Value, DeadlineError>;

    /// Replace the whole document. Either the full value is committed or
    /// nothing is.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Persistence`] when the store is unreachable.
    fn save(&self, document: &Value) -> Result<(), DeadlineError>;

    /// Load, let `edit` change the document, then save it.
    ///
    /// Nothing is saved when `edit` fails. Stores that can be shared between
    /// processes override this to hold a lock for the whole cycle.
    ///
    /// # Errors
    ///
    /// Propagates errors from `load`, `edit`, and `save`.
    fn update(
        &self,
        edit: &mut dyn FnMut(&mut Value) -> Result<(), DeadlineError>,
    ) -> Result<(), DeadlineError> {
        let mut document = self.load()?;
        edit(&mut document)?;
        self.save(&document)
    }
}

/// Registry document stored as pretty-printed JSON on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_err(&self, err: impl std::fmt::Display) -> DeadlineError {
        DeadlineError::persistence(&self.path, ErrorCode::ConfigWriteFailed, err)
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> Result<Value, DeadlineError> {
        if !self.path.exists() {
            return Ok(Value::Null);
        }

        let content = fs::read_to_string(&self.path).map_err(|err| {
            DeadlineError::persistence(&self.path, ErrorCode::ConfigUnreadable, err)
        })?;
        if content.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&content)
            .map_err(|err| DeadlineError::ConfigShape(format!("{}: {err}", self.path.display())))
    }

    fn save(&self, document: &Value) -> Result<(), DeadlineError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| self.write_err(err))?;
        }

        let mut serialized =
            serde_json::to_string_pretty(document).map_err(|err| self.write_err(err))?;
        serialized.push('\n');

        let temp = self.temp_path();
        let mut file = fs::File::create(&temp).map_err(|err| self.write_err(err))?;
        file.write_all(serialized.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|err| self.write_err(err))?;
        drop(file);

        fs::rename(&temp, &self.path).map_err(|err| {
            let _ = fs::remove_file(&temp);
            self.write_err(err)
        })?;
        debug!(path = %self.path.display(), "saved registry document");
        Ok(())
    }

    fn update(
        &self,
        edit: &mut dyn FnMut(&mut Value) -> Result<(), DeadlineError>,
    ) -> Result<(), DeadlineError> {
        let lock = ConfigLock::acquire(&ConfigLock::path_for(&self.path), self.lock_timeout)?;
        let mut document = self.load()?;
        edit(&mut document)?;
        self.save(&document)?;
        lock.release();
        Ok(())
    }
}

/// In-memory store. Saves can be made to fail to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: RefCell<Value>,
    fail_saves: Cell<bool>,
    saves: Cell<usize>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(document: Value) -> Self {
        Self {
            document: RefCell::new(document),
            fail_saves: Cell::new(false),
            saves: Cell::new(0),
        }
    }

    /// Make every subsequent save fail with a persistence error.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.set(fail);
    }

    /// Number of successful saves so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    /// Snapshot of the stored document.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        self.document.borrow().clone()
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<Value, DeadlineError> {
        Ok(self.snapshot())
    }

    fn save(&self, document: &Value) -> Result<(), DeadlineError> {
        if self.fail_saves.get() {
            return Err(DeadlineError::persistence(
                "<memory>",
                ErrorCode::ConfigWriteFailed,
                "store unavailable",
            ));
        }
        *self.document.borrow_mut() = document.clone();
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

impl<S: ConfigStore + ?Sized> ConfigStore for &S {
    fn load(&self) -> Result<Value, DeadlineError> {
        (**self).load()
    }

    fn save(&self, document: &Value) -> Result<(), DeadlineError> {
        (**self).save(document)
    }

    fn update(
        &self,
        edit: &mut dyn FnMut(&mut Value) -> Result<(), DeadlineError>,
    ) -> Result<(), DeadlineError> {
        (**self).update(edit)
    }
}
