//! Error types for availability computation.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AvailabilityError {
    /// The query itself cannot produce a result. Fatal for the call.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A single calendar event could not be turned into a busy interval.
    /// The normalizer skips the event and keeps going.
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Invalid interval: start {start} is not before end {end}")]
    InvalidInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid RRULE: {0}")]
    InvalidRule(String),
}

pub type Result<T> = std::result::Result<T, AvailabilityError>;
