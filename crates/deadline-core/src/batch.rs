//! Batch processing of a profile's deadlines, plus assignment helpers that
//! keep the registry and the host's per-group settings in step.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::calc::{GroupReport, days_until, run_for_group};
use crate::error::{DeadlineError, ErrorCode};
use crate::host::{Host, Notifier};
use crate::model::{DeadlineEntry, ReportMode};
use crate::registry::Registry;
use crate::store::ConfigStore;

/// Inputs for one [`run_batch`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    pub profile: String,
    /// Suppress notifications (startup runs).
    pub silent: bool,
    pub include_today: bool,
    /// Calendar date the whole batch is computed against.
    pub today: NaiveDate,
}

/// A group whose processing failed without aborting the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupFailure {
    pub group: String,
    pub code: String,
    pub message: String,
}

impl GroupFailure {
    fn new(group: &str, err: &DeadlineError) -> Self {
        Self {
            group: group.to_string(),
            code: err.code().code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub profile: String,
    pub processed: Vec<GroupReport>,
    /// Groups registered without a date.
    pub skipped: Vec<String>,
    pub failures: Vec<GroupFailure>,
}

impl BatchReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Recompute and write back the daily quota of every group registered for
/// `opts.profile`.
///
/// A bad date or a host failure is recorded for that group and the rest of
/// the batch continues. Store failures abort the batch.
///
/// # Errors
///
/// Returns [`DeadlineError::Persistence`] or [`DeadlineError::ConfigShape`]
/// when the registry cannot be loaded.
pub fn run_batch<S, H>(
    registry: &Registry<S>,
    host: &mut H,
    notifier: &mut dyn Notifier,
    opts: &BatchOptions,
) -> Result<BatchReport, DeadlineError>
where
    S: ConfigStore,
    H: Host + ?Sized,
{
    let doc = registry.load()?;
    let mut report = BatchReport {
        profile: opts.profile.clone(),
        ..BatchReport::default()
    };

    for entry in doc.entries_for(&opts.profile) {
        match process_entry(host, &entry, opts) {
            Ok(Some(group_report)) => report.processed.push(group_report),
            Ok(None) => report.skipped.push(entry.group),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(group = %entry.group, code = %err.code(), error = %err, "skipping group");
                report.failures.push(GroupFailure::new(&entry.group, &err));
            }
        }
    }

    info!(
        profile = %opts.profile,
        processed = report.processed.len(),
        skipped = report.skipped.len(),
        failed = report.failures.len(),
        "deadline batch finished"
    );

    if !opts.silent {
        deliver(notifier, &report, doc.report_mode);
    }
    Ok(report)
}

fn process_entry<H: Host + ?Sized>(
    host: &mut H,
    entry: &DeadlineEntry,
    opts: &BatchOptions,
) -> Result<Option<GroupReport>, DeadlineError> {
    let target = entry.target_date()?;
    let Some(days_left) = days_until(target, opts.include_today, opts.today) else {
        return Ok(None);
    };

    let seen_today = host.count_first_seen_today(&entry.group)?;
    let remaining = host.count_unseen(&entry.group)?;
    let report = run_for_group(&entry.group, seen_today, remaining, days_left);

    host.ensure_dedicated_config(&entry.group)?;
    host.set_daily_quota(&entry.group, report.quota)?;
    Ok(Some(report))
}

fn deliver(notifier: &mut dyn Notifier, report: &BatchReport, mode: ReportMode) {
    let failures = report
        .failures
        .iter()
        .map(|failure| format!("{}: {}", failure.group, failure.message));

    match mode {
        ReportMode::Many => {
            for group in &report.processed {
                notifier.notify(&group.summary());
            }
            for message in failures {
                notifier.notify(&message);
            }
        }
        ReportMode::One => {
            let parts: Vec<String> = report
                .processed
                .iter()
                .map(GroupReport::summary)
                .chain(failures)
                .collect();
            if parts.is_empty() {
                notifier.notify(&format!("No deadlines to process for profile {}", report.profile));
            } else {
                notifier.notify(&parts.join("\n\n"));
            }
        }
    }
}

/// Register `date` for `group` and give it dedicated host settings.
///
/// A group with sub-groups is left alone unless `recursive`, in which case
/// the date goes to each leaf descendant instead. Returns the groups that
/// were assigned, in order; empty when a parent was skipped.
///
/// Host settings are split off for every target before the registry is
/// written, and all targets are registered in one save. A host failure leaves
/// the registry untouched, though targets handled before it keep their
/// dedicated settings.
///
/// # Errors
///
/// Returns [`DeadlineError::Host`] if the group is unknown to the host, and
/// [`DeadlineError::Persistence`] if the registry cannot be written.
pub fn assign<S, H>(
    registry: &Registry<S>,
    host: &mut H,
    profile: &str,
    group: &str,
    date: Option<NaiveDate>,
    recursive: bool,
) -> Result<Vec<String>, DeadlineError>
where
    S: ConfigStore,
    H: Host + ?Sized,
{
    let children = host.child_groups(group)?;
    let targets = if children.is_empty() {
        vec![group.to_string()]
    } else if recursive {
        let mut leaves = Vec::new();
        for child in &children {
            if host.child_groups(child)?.is_empty() {
                leaves.push(child.clone());
            }
        }
        leaves
    } else {
        warn!(group, children = children.len(), "group has sub-groups, not assigning");
        return Ok(Vec::new());
    };

    for target in &targets {
        host.ensure_dedicated_config(target)?;
    }
    registry.add_all(profile, &targets, date)?;
    info!(profile, group, assigned = targets.len(), "deadline assigned");
    Ok(targets)
}

/// Remove the deadline for `group` and release its dedicated host settings.
///
/// A group the host no longer knows has nothing to release; its entry is
/// still removed.
///
/// # Errors
///
/// Returns [`DeadlineError::NotFound`] when no deadline is registered, and
/// [`DeadlineError::Host`] if the host settings cannot be released, in which
/// case the entry is kept.
pub fn unassign<S, H>(
    registry: &Registry<S>,
    host: &mut H,
    profile: &str,
    group: &str,
) -> Result<(), DeadlineError>
where
    S: ConfigStore,
    H: Host + ?Sized,
{
    if !registry.contains(profile, group)? {
        return Err(DeadlineError::NotFound {
            profile: profile.to_string(),
            group: group.to_string(),
        });
    }

    match host.release_dedicated_config(group) {
        Ok(()) => {}
        Err(err) if err.code() == ErrorCode::GroupNotFound => {
            warn!(profile, group, "group no longer exists, nothing to release");
        }
        Err(err) => return Err(err),
    }
    registry.remove(profile, group)?;
    info!(profile, group, "deadline removed");
    Ok(())
}
