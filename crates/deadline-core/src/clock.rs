//! Wall-clock access behind a trait so calculations can run against a fixed date.

use chrono::{DateTime, Local, NaiveDate, TimeZone};

/// Source of "now" for a batch run. Sampled once per run.
pub trait Clock {
    /// Current local date and time.
    fn now(&self) -> DateTime<Local>;

    /// Current local calendar date.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    now: DateTime<Local>,
}

impl FixedClock {
    #[must_use]
    pub const fn new(now: DateTime<Local>) -> Self {
        Self { now }
    }

    /// Freeze the clock at noon local time on `date`.
    ///
    /// Noon stays clear of any rollover hour and DST transition, so the
    /// resulting `today()` is always `date`.
    #[must_use]
    pub fn at_noon(date: NaiveDate) -> Self {
        let naive = date.and_hms_opt(12, 0, 0).unwrap_or_default();
        let now = Local
            .from_local_datetime(&naive)
            .earliest()
            .unwrap_or_else(|| Local.from_utc_datetime(&naive));
        Self { now }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.now
    }
}
