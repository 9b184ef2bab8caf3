use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::DeadlineError;

/// Storage format for deadline dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a stored date string for `group`.
///
/// An empty (or whitespace-only) string means "no deadline" and yields `None`.
///
/// # Errors
///
/// Returns [`DeadlineError::Parse`] when the string is not a valid calendar date.
pub fn parse_date(group: &str, raw: &str) -> Result<Option<NaiveDate>, DeadlineError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map(Some)
        .map_err(|source| DeadlineError::Parse {
            group: group.to_string(),
            value: raw.to_string(),
            source,
        })
}

/// Render a date in storage format.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// One (profile, group) → date association as stored in the registry.
///
/// The date is kept raw so that a malformed value surfaces as a per-group
/// [`DeadlineError::Parse`] during processing instead of failing the whole load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlineEntry {
    pub profile: String,
    pub group: String,
    pub date: String,
}

impl DeadlineEntry {
    #[must_use]
    pub fn new(profile: impl Into<String>, group: impl Into<String>, date: Option<NaiveDate>) -> Self {
        Self {
            profile: profile.into(),
            group: group.into(),
            date: date.map(format_date).unwrap_or_default(),
        }
    }

    /// The parsed target date, `None` when no deadline is enforced.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError::Parse`] when the stored date is malformed.
    pub fn target_date(&self) -> Result<Option<NaiveDate>, DeadlineError> {
        parse_date(&self.group, &self.date)
    }
}

/// How a manual batch run reports its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReportMode {
    /// One message aggregating every group.
    #[default]
    One,
    /// One message per group.
    Many,
}

impl ReportMode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::One => "One",
            Self::Many => "Many",
        }
    }
}

impl From<String> for ReportMode {
    fn from(raw: String) -> Self {
        if raw.eq_ignore_ascii_case("many") {
            Self::Many
        } else {
            Self::One
        }
    }
}

impl From<ReportMode> for String {
    fn from(mode: ReportMode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for ReportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "one" | "single" => Ok(Self::One),
            "many" | "multiple" => Ok(Self::Many),
            other => Err(format!("unknown report mode '{other}', expected one or many")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_date_means_no_deadline() {
        assert_eq!(parse_date("g", "").expect("parse"), None);
        assert_eq!(parse_date("g", "   ").expect("parse"), None);
    }

    #[test]
    fn valid_date_parses() {
        let date = parse_date("g", "2026-12-31").expect("parse");
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 12, 31));
    }

    #[test]
    fn impossible_date_is_a_parse_error() {
        let err = parse_date("Spanish", "2026-02-30").unwrap_err();
        assert!(matches!(err, DeadlineError::Parse { ref group, .. } if group == "Spanish"));

        let err = parse_date("Spanish", "next tuesday").unwrap_err();
        assert!(err.to_string().contains("next tuesday"));
    }

    #[test]
    fn entry_round_trips_date_through_storage_format() {
        let date = NaiveDate::from_ymd_opt(2027, 1, 5).expect("valid");
        let entry = DeadlineEntry::new("alice", "Kanji", Some(date));
        assert_eq!(entry.date, "2027-01-05");
        assert_eq!(entry.target_date().expect("parse"), Some(date));

        let open = DeadlineEntry::new("alice", "Kanji", None);
        assert_eq!(open.date, "");
        assert_eq!(open.target_date().expect("parse"), None);
    }

    #[test]
    fn report_mode_serializes_as_legacy_strings() {
        assert_eq!(serde_json::to_value(ReportMode::Many).expect("ser"), "Many");
        let mode: ReportMode = serde_json::from_value(serde_json::json!("Many")).expect("de");
        assert_eq!(mode, ReportMode::Many);
        let fallback: ReportMode = serde_json::from_value(serde_json::json!("whatever")).expect("de");
        assert_eq!(fallback, ReportMode::One);
    }

    #[test]
    fn report_mode_parses_cli_spellings() {
        assert_eq!("many".parse::<ReportMode>(), Ok(ReportMode::Many));
        assert_eq!("Single".parse::<ReportMode>(), Ok(ReportMode::One));
        assert!("both".parse::<ReportMode>().is_err());
    }
}
