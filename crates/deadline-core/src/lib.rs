//! deadline-core library.
//!
//! Paces the introduction of new review items so a group's backlog is
//! finished by its target date.
//!
//! # Conventions
//!
//! - **Errors**: [`error::DeadlineError`] with a machine [`error::ErrorCode`].
//! - **Logging**: `tracing` macros; the binary installs the subscriber.

pub mod batch;
pub mod calc;
pub mod clock;
pub mod collection;
pub mod config;
pub mod error;
pub mod host;
pub mod lock;
pub mod model;
pub mod registry;
pub mod store;

pub use batch::{BatchOptions, BatchReport, assign, run_batch, unassign};
pub use error::{DeadlineError, ErrorCode};
pub use registry::Registry;
