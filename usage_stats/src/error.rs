//! Error types for the usage engine.
//!
//! Two layers, mirroring how failures are handled:
//! - [`RowRejection`] explains why a single row was skipped. It is counted and
//!   logged by the validator and never aborts a pass.
//! - [`UsageError`] is fatal to the pass that raised it; nothing aggregated by
//!   that pass is published.

use chrono::{DateTime, Utc};
use thiserror::Error;
use warehouse_source::SourceError;

/// Why a raw row could not become an access event ("malformed row").
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowRejection {
    /// A required column held NULL.
    #[error("column `{column}` is null")]
    MissingValue { column: &'static str },

    /// A column held a value of the wrong type.
    #[error("column `{column}` expected {expected}, found {found}")]
    WrongType {
        column: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// A timestamp column held text that is not a recognised datetime.
    #[error("column `{column}` holds unparseable timestamp {value:?}")]
    BadTimestamp { column: &'static str, value: String },

    /// The query ended before it started.
    #[error("start time {start} is after end time {end}")]
    InvertedTimes {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Fatal errors raised by a usage or operation pass.
#[derive(Debug, Error)]
pub enum UsageError {
    /// Fetching from the warehouse failed mid-stream.
    #[error("warehouse source failed: {0}")]
    Source(#[from] SourceError),

    /// The result's column description does not match the expected query shape.
    #[error("unexpected result shape (missing: {missing:?}, unexpected: {unexpected:?})")]
    QueryShape {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// An operation event carried a kind other than insert/delete. This points
    /// at a broken query template, not at bad data.
    #[error("unsupported operation type {value:?} on {resource}")]
    UnknownOperation { value: String, resource: String },

    /// The configured user email pattern is not a valid regex.
    #[error("invalid user email pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}
