//! Parsing of the pipe-delimited routine table.
//!
//! ```text
//! | Time  | Activity    | Notes        |
//! |-------|-------------|--------------|
//! | 09:00 | Standup     | Team channel |
//! | 09:15 | Focus Block |              |
//! ```
//!
//! The first pipe-prefixed line is the header. Separator rows, blank lines and
//! rows whose cell count differs from the header are dropped. Every other
//! column besides `Time` and `Activity` is kept as a free-form attribute.

use std::path::Path;

use chrono::{NaiveTime, TimeDelta};

use crate::constants::DEFAULT_SPAN_MINUTES;
use crate::error::{RoutineError, RoutineResult};

pub const TIME_COLUMN: &str = "Time";
pub const ACTIVITY_COLUMN: &str = "Activity";

/// Formats tried in order against the compacted, upper-cased time cell.
const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%I:%M%p", "%I:%M:%S%p", "%H.%M"];

/// One row of the routine table
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub activity: String,
    /// Time cell as written
    pub time: String,
    pub time_parsed: Option<NaiveTime>,
    pub duration: TimeDelta,
    /// Remaining columns, in header order
    pub attributes: Vec<(String, String)>,
}

impl Entry {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

pub fn default_span() -> TimeDelta {
    TimeDelta::minutes(DEFAULT_SPAN_MINUTES)
}

/// Read and parse a routine file.
pub fn load(path: &Path) -> RoutineResult<Vec<Entry>> {
    let text = std::fs::read_to_string(path)?;
    parse(&text)
}

pub fn parse(text: &str) -> RoutineResult<Vec<Entry>> {
    let mut rows = text
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('|'))
        .map(split_cells)
        .filter(|cells| !is_separator(cells));

    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };

    let time_idx = column_index(&header, TIME_COLUMN)?;
    let activity_idx = column_index(&header, ACTIVITY_COLUMN)?;

    let mut entries: Vec<Entry> = rows
        .filter(|cells| cells.len() == header.len())
        .map(|cells| build_entry(&header, cells, time_idx, activity_idx))
        .collect();

    infer_durations(&mut entries);

    Ok(entries)
}

/// Parse a time-of-day cell such as `09:00`, `9:30 pm`, `7am` or `14.45`.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let compact = raw.split_whitespace().collect::<String>().to_ascii_uppercase();
    if compact.is_empty() {
        return None;
    }

    // "7PM" has no minutes, which chrono refuses to parse
    let hour_only = (compact.ends_with("AM") || compact.ends_with("PM")) && !compact.contains(':');
    let normalized = if hour_only {
        let (hour, suffix) = compact.split_at(compact.len() - 2);
        format!("{hour}:00{suffix}")
    } else {
        compact
    };

    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&normalized, fmt).ok())
}

fn split_cells(line: &str) -> Vec<String> {
    let inner = line.strip_prefix('|').unwrap_or(line);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|cell| cell.trim().to_string()).collect()
}

fn is_separator(cells: &[String]) -> bool {
    cells.iter().all(|cell| {
        cell.contains('-') && cell.chars().all(|c| c == '-' || c == ':')
    })
}

fn column_index(header: &[String], name: &'static str) -> RoutineResult<usize> {
    header
        .iter()
        .position(|h| h == name)
        .ok_or(RoutineError::MissingColumn(name))
}

fn build_entry(header: &[String], cells: Vec<String>, time_idx: usize, activity_idx: usize) -> Entry {
    let mut activity = String::new();
    let mut time = String::new();
    let mut attributes = Vec::new();

    for (idx, (key, value)) in header.iter().zip(cells).enumerate() {
        if idx == time_idx {
            time = value;
        } else if idx == activity_idx {
            activity = value;
        } else {
            attributes.push((key.clone(), value));
        }
    }

    Entry {
        time_parsed: parse_time_of_day(&time),
        activity,
        time,
        duration: default_span(),
        attributes,
    }
}

/// Each entry lasts until the next one starts; the last (or any entry next to
/// an unparseable time) gets the default span.
fn infer_durations(entries: &mut [Entry]) {
    for i in 0..entries.len() {
        let next = entries.get(i + 1).and_then(|e| e.time_parsed);

        entries[i].duration = match (entries[i].time_parsed, next) {
            (Some(current), Some(next)) => gap(current, next),
            _ => default_span(),
        };
    }
}

/// A next entry earlier in the day belongs to the following day.
fn gap(from: NaiveTime, to: NaiveTime) -> TimeDelta {
    let delta = to.signed_duration_since(from);
    if delta < TimeDelta::zero() {
        delta + TimeDelta::days(1)
    } else {
        delta
    }
}
