//! Contracts with the application that owns the items and their settings.
//!
//! The calculator never queries storage itself. A [`Host`] supplies the
//! backlog snapshot and receives the computed quota; a [`Notifier`] delivers
//! user-visible reports. [`crate::collection::Collection`] is the SQLite
//! implementation; [`StaticHost`] is a fixed in-memory one.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{DeadlineError, ErrorCode};

/// Secondary review cap written alongside each quota, as a multiple of it.
pub const REVIEW_CAP_RATIO: u64 = 10;

/// Review cap derived from a daily new-item quota.
#[must_use]
pub const fn review_cap(quota: u64) -> u64 {
    quota.saturating_mul(REVIEW_CAP_RATIO)
}

/// Backlog queries and settings write-back for groups of items.
pub trait Host {
    /// Items in `group` never introduced, excluding suspended ones.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Host`] when the group is unknown or the query fails.
    fn count_unseen(&self, group: &str) -> Result<u64, DeadlineError>;

    /// Items in `group` first introduced since the host's day boundary.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Host`] when the group is unknown or the query fails.
    fn count_first_seen_today(&self, group: &str) -> Result<u64, DeadlineError>;

    /// Persist `quota` as the group's daily new-item cap and
    /// [`review_cap`]`(quota)` as its review cap.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Host`] when the write fails.
    fn set_daily_quota(&mut self, group: &str, quota: u64) -> Result<(), DeadlineError>;

    /// Descendant groups of `group` (empty for a leaf).
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Host`] when the group is unknown.
    fn child_groups(&self, group: &str) -> Result<Vec<String>, DeadlineError>;

    /// Give `group` its own settings so its quota does not leak into other
    /// groups sharing the same settings. A no-op when it already has its own.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Host`] when the write fails.
    fn ensure_dedicated_config(&mut self, group: &str) -> Result<(), DeadlineError>;

    /// Drop the settings created by [`Host::ensure_dedicated_config`]. The shared
    /// default settings and settings still used by another group are never
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Host`] when the write fails.
    fn release_dedicated_config(&mut self, group: &str) -> Result<(), DeadlineError>;
}

/// User-visible delivery of batch results.
pub trait Notifier {
    fn notify(&mut self, message: &str);
}

/// Notifier that keeps every message, in order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectingNotifier {
    pub messages: Vec<String>,
}

impl Notifier for CollectingNotifier {
    fn notify(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}

/// Per-group state held by [`StaticHost`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticGroup {
    pub unseen: u64,
    pub seen_today: u64,
    pub new_per_day: Option<u64>,
    pub review_per_day: Option<u64>,
    pub dedicated_config: bool,
    pub children: Vec<String>,
}

/// Fixed in-memory [`Host`]. Groups must be registered before use.
#[derive(Debug, Clone, Default)]
pub struct StaticHost {
    groups: BTreeMap<String, StaticGroup>,
    failing_writes: BTreeSet<String>,
}

impl StaticHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a leaf group with the given backlog.
    #[must_use]
    pub fn with_group(mut self, name: &str, unseen: u64, seen_today: u64) -> Self {
        self.groups.insert(
            name.to_string(),
            StaticGroup {
                unseen,
                seen_today,
                ..StaticGroup::default()
            },
        );
        self
    }

    /// Register `child` under an already-registered `parent`.
    #[must_use]
    pub fn with_child(mut self, parent: &str, child: &str, unseen: u64, seen_today: u64) -> Self {
        if let Some(group) = self.groups.get_mut(parent) {
            group.children.push(child.to_string());
        }
        self.with_group(child, unseen, seen_today)
    }

    /// Make every settings write for `name` fail with a query error.
    #[must_use]
    pub fn with_failing_writes(mut self, name: &str) -> Self {
        self.failing_writes.insert(name.to_string());
        self
    }

    #[must_use]
    pub fn group(&self, name: &str) -> Option<&StaticGroup> {
        self.groups.get(name)
    }

    fn lookup(&self, name: &str) -> Result<&StaticGroup, DeadlineError> {
        self.groups.get(name).ok_or_else(|| unknown_group(name))
    }

    fn lookup_mut(&mut self, name: &str) -> Result<&mut StaticGroup, DeadlineError> {
        if self.failing_writes.contains(name) {
            return Err(DeadlineError::Host {
                group: name.to_string(),
                reason: "settings write rejected".to_string(),
                code: ErrorCode::CollectionQueryFailed,
            });
        }
        self.groups.get_mut(name).ok_or_else(|| unknown_group(name))
    }
}

fn unknown_group(name: &str) -> DeadlineError {
    DeadlineError::Host {
        group: name.to_string(),
        reason: "no such group".to_string(),
        code: ErrorCode::GroupNotFound,
    }
}

impl Host for StaticHost {
    fn count_unseen(&self, group: &str) -> Result<u64, DeadlineError> {
        Ok(self.lookup(group)?.unseen)
    }

    fn count_first_seen_today(&self, group: &str) -> Result<u64, DeadlineError> {
        Ok(self.lookup(group)?.seen_today)
    }

    fn set_daily_quota(&mut self, group: &str, quota: u64) -> Result<(), DeadlineError> {
        let entry = self.lookup_mut(group)?;
        entry.new_per_day = Some(quota);
        entry.review_per_day = Some(review_cap(quota));
        Ok(())
    }

    fn child_groups(&self, group: &str) -> Result<Vec<String>, DeadlineError> {
        let mut out = Vec::new();
        let mut pending = self.lookup(group)?.children.clone();
        while let Some(child) = pending.pop() {
            if let Some(grandchildren) = self.groups.get(&child).map(|g| g.children.clone()) {
                pending.extend(grandchildren);
            }
            out.push(child);
        }
        out.sort();
        Ok(out)
    }

    fn ensure_dedicated_config(&mut self, group: &str) -> Result<(), DeadlineError> {
        self.lookup_mut(group)?.dedicated_config = true;
        Ok(())
    }

    fn release_dedicated_config(&mut self, group: &str) -> Result<(), DeadlineError> {
        self.lookup_mut(group)?.dedicated_config = false;
        Ok(())
    }
}
