//! Error types for routine-sync.

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

use crate::service::ServiceError;

/// Errors that can occur in routine-sync operations.
#[derive(Error, Debug)]
pub enum RoutineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("Invalid date range: {0}")]
    DateRange(String),

    #[error("Schedule header has no '{0}' column")]
    MissingColumn(&'static str),

    #[error("Entry '{0}' has no parseable time")]
    UnparsedTime(String),

    #[error("{time} on {date} does not exist in {tz}")]
    NonexistentLocalTime {
        date: NaiveDate,
        time: NaiveTime,
        tz: String,
    },

    #[error("Calendar service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for routine-sync operations.
pub type RoutineResult<T> = Result<T, RoutineError>;
