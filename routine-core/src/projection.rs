//! Placing routine entries on a concrete calendar date.

use chrono::{DateTime, NaiveDate, TimeZone};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{RoutineError, RoutineResult};
use crate::reconcile::MatchKey;
use crate::schedule::Entry;

/// An entry realized at a concrete date and time, ready to send to a calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedEvent {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl ProjectedEvent {
    pub fn match_key(&self) -> MatchKey {
        MatchKey::new(&self.summary, self.start.to_rfc3339())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EventProjector {
    tz: Tz,
}

impl EventProjector {
    pub fn new(tz: Tz) -> Self {
        EventProjector { tz }
    }

    pub fn project(&self, entry: &Entry, date: NaiveDate) -> RoutineResult<ProjectedEvent> {
        let time = entry
            .time_parsed
            .ok_or_else(|| RoutineError::UnparsedTime(entry.activity.clone()))?;

        // Ambiguous local times (DST fall-back) resolve to the first occurrence
        let start = self
            .tz
            .from_local_datetime(&date.and_time(time))
            .earliest()
            .ok_or_else(|| RoutineError::NonexistentLocalTime {
                date,
                time,
                tz: self.tz.name().to_string(),
            })?;

        Ok(ProjectedEvent {
            summary: entry.activity.clone(),
            description: describe(entry),
            start,
            end: start + entry.duration,
        })
    }

    /// Project every entry that can be placed on `date`, logging the rest.
    pub fn project_all(&self, entries: &[Entry], date: NaiveDate) -> Vec<ProjectedEvent> {
        entries
            .iter()
            .filter_map(|entry| match self.project(entry, date) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(%date, time = %entry.time, "Skipping '{}': {}", entry.activity, e);
                    None
                }
            })
            .collect()
    }
}

/// `Key: Value` lines for every non-empty extra column.
fn describe(entry: &Entry) -> String {
    entry
        .attributes
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{key}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}
