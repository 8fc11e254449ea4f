//! Remote calendar events as seen by the reconciler.
//!
//! Providers convert their API responses into these types. Only the fields
//! needed for identity matching are kept.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};

#[derive(Debug, Clone, PartialEq)]
pub enum EventTime {
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
}

impl EventTime {
    /// Timestamp string in the given zone, or empty for all-day values.
    pub fn key_string<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        match self {
            EventTime::DateTime(dt) => dt.with_timezone(tz).to_rfc3339(),
            EventTime::Date(_) => String::new(),
        }
    }
}

/// An event already present on the remote calendar
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingEvent {
    pub id: String,
    pub summary: String,
    pub start: Option<EventTime>,
}
