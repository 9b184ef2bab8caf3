//! Deadline arithmetic: days remaining and the per-day quota.
//!
//! Everything here is a pure function of its arguments. The wall-clock date is
//! passed in by the caller (see [`crate::clock::Clock`]) so the same inputs
//! always give the same quota.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Days left until `target`, counted in whole calendar days from `today`.
///
/// With `include_today` the current day counts as one of the days left, so a
/// deadline of today yields `1`. Deadlines in the past clamp to `0`.
/// Returns `None` when there is no target date; callers skip such groups.
#[must_use]
pub fn days_until(target: Option<NaiveDate>, include_today: bool, today: NaiveDate) -> Option<i64> {
    let target = target?;
    let mut days = target.signed_duration_since(today).num_days();
    if include_today {
        days += 1;
    }
    Some(days.max(0))
}

/// Items to introduce per day so `remaining` reaches zero in `days_left` days.
///
/// Rounds up. Once the deadline has passed (`days_left <= 0`) the whole
/// backlog is released at once. A negative `remaining` yields `0`.
#[must_use]
pub fn quota(remaining: i64, days_left: i64) -> u64 {
    let remaining = u64::try_from(remaining).unwrap_or(0);
    let Ok(days) = u64::try_from(days_left) else {
        return remaining;
    };
    if days == 0 {
        return remaining;
    }
    remaining.div_ceil(days)
}

/// Result of one group's calculation, kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub group: String,
    /// Items first introduced today.
    pub seen_today: u64,
    /// Items never introduced.
    pub remaining: u64,
    /// `seen_today + remaining`: the pool the quota is spread over.
    pub total: u64,
    pub days_left: i64,
    pub quota: u64,
}

impl GroupReport {
    /// Multi-line summary shown to the user after a manual run.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}\n\nNew items seen today: {}\nNew items remaining: {}\nDays left: {}\nNew items per day: {}",
            self.group, self.seen_today, self.remaining, self.days_left, self.quota
        )
    }
}

impl fmt::Display for GroupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/day ({} left over {} days)",
            self.group, self.quota, self.total, self.days_left
        )
    }
}

/// Compute the quota for one group from its backlog snapshot.
///
/// Today's already-introduced items are added back into the pool so that
/// re-running later the same day produces the same quota.
#[must_use]
pub fn run_for_group(group: &str, seen_today: u64, remaining: u64, days_left: i64) -> GroupReport {
    let total = seen_today.saturating_add(remaining);
    let per_day = quota(i64::try_from(total).unwrap_or(i64::MAX), days_left);
    debug!(group, seen_today, remaining, days_left, quota = per_day, "computed quota");
    GroupReport {
        group: group.to_string(),
        seen_today,
        remaining,
        total,
        days_left,
        quota: per_day,
    }
}
