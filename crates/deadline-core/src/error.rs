use std::fmt;
use std::path::PathBuf;

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidDate,
    DeadlineNotFound,
    ConfigUnreadable,
    ConfigWriteFailed,
    ConfigShape,
    LockContention,
    GroupNotFound,
    CollectionQueryFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidDate => "E1001",
            Self::DeadlineNotFound => "E2001",
            Self::ConfigUnreadable => "E3001",
            Self::ConfigWriteFailed => "E3002",
            Self::ConfigShape => "E3003",
            Self::LockContention => "E3004",
            Self::GroupNotFound => "E4001",
            Self::CollectionQueryFailed => "E4002",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidDate => "Invalid deadline date",
            Self::DeadlineNotFound => "Deadline not found",
            Self::ConfigUnreadable => "Deadline config could not be read",
            Self::ConfigWriteFailed => "Deadline config could not be written",
            Self::ConfigShape => "Deadline config has an unexpected shape",
            Self::LockContention => "Lock contention",
            Self::GroupNotFound => "Group not found in collection",
            Self::CollectionQueryFailed => "Collection query failed",
        }
    }

    /// Optional remediation hint that can be surfaced to the user.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::InvalidDate => Some("Use the YYYY-MM-DD format, e.g. 2026-12-31."),
            Self::DeadlineNotFound => Some("Run `dl list` to see deadlines for this profile."),
            Self::ConfigUnreadable => Some("Check that the deadline config file exists and is readable."),
            Self::ConfigWriteFailed => Some("Check disk space and write permissions."),
            Self::ConfigShape => Some("Fix the JSON in the deadline config file and retry."),
            Self::LockContention => Some("Retry after the other `dl` process releases its lock."),
            Self::GroupNotFound => Some("Check the group name against the collection's deck list."),
            Self::CollectionQueryFailed => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the deadline calculator, registry, and host adapters.
#[derive(Debug, thiserror::Error)]
pub enum DeadlineError {
    /// A stored or supplied date is not a valid `YYYY-MM-DD` calendar date.
    #[error("invalid date {value:?} for group {group:?}: {source}")]
    Parse {
        group: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("no deadline for group {group:?} in profile {profile:?}")]
    NotFound { profile: String, group: String },

    /// The backing config store could not be read or written.
    #[error("config store {path}: {reason}")]
    Persistence {
        path: PathBuf,
        reason: String,
        code: ErrorCode,
    },

    #[error("config document cannot be normalized: {0}")]
    ConfigShape(String),

    /// A host collaborator failed for a single group.
    #[error("host error for group {group:?}: {reason}")]
    Host {
        group: String,
        reason: String,
        code: ErrorCode,
    },
}

impl DeadlineError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Parse { .. } => ErrorCode::InvalidDate,
            Self::NotFound { .. } => ErrorCode::DeadlineNotFound,
            Self::Persistence { code, .. } | Self::Host { code, .. } => *code,
            Self::ConfigShape(_) => ErrorCode::ConfigShape,
        }
    }

    /// Optional remediation hint for the user.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// Whether this error must abort a whole batch rather than a single group.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Persistence { .. } | Self::ConfigShape(_))
    }

    pub(crate) fn persistence(
        path: impl Into<PathBuf>,
        code: ErrorCode,
        reason: impl fmt::Display,
    ) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.to_string(),
            code,
        }
    }
}
