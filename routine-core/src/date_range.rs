//! Inclusive range of calendar dates to sync.

use chrono::{Days, NaiveDate};

use crate::error::{RoutineError, RoutineResult};

/// A run of consecutive dates starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    /// Number of dates covered, at least one
    pub days: u32,
}

impl DateRange {
    pub fn new(start: NaiveDate, days: u32) -> Self {
        DateRange {
            start,
            days: days.max(1),
        }
    }

    pub fn single(date: NaiveDate) -> Self {
        Self::new(date, 1)
    }

    /// Build a range from command-line strings.
    /// - `start`: YYYY-MM-DD
    /// - `end`: YYYY-MM-DD, inclusive
    /// - `days`: number of days from `start`
    ///
    /// `end` and `days` are mutually exclusive; with neither the range is one day.
    pub fn from_args(start: &str, end: Option<&str>, days: Option<u32>) -> RoutineResult<Self> {
        let start = parse_date(start)?;

        match (end, days) {
            (Some(_), Some(_)) => Err(RoutineError::DateRange(
                "Give either an end date or a number of days, not both".to_string(),
            )),
            (Some(end), None) => {
                let end = parse_date(end)?;
                if end < start {
                    return Err(RoutineError::DateRange(format!(
                        "End date {end} is before start date {start}"
                    )));
                }
                let span = (end - start).num_days() + 1;
                let days = u32::try_from(span)
                    .map_err(|_| RoutineError::DateRange(format!("Range of {span} days is too long")))?;
                Ok(Self::new(start, days))
            }
            (None, Some(0)) => Err(RoutineError::DateRange("Number of days must be at least 1".to_string())),
            (None, Some(days)) => Ok(Self::new(start, days)),
            (None, None) => Ok(Self::single(start)),
        }
    }

    /// Every date in the range, in order. Stops early at the end of the calendar.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..self.days).map_while(|offset| self.start.checked_add_days(Days::new(u64::from(offset))))
    }

    pub fn last(&self) -> NaiveDate {
        self.dates().last().unwrap_or(self.start)
    }
}

fn parse_date(s: &str) -> RoutineResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| RoutineError::DateRange(format!("Invalid date format '{s}'. Expected YYYY-MM-DD")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_defaults_to_single_day() {
        let range = DateRange::from_args("2024-01-02", None, None).unwrap();

        assert_eq!(range, DateRange::single(d(2024, 1, 2)));
        assert_eq!(range.dates().collect::<Vec<_>>(), vec![d(2024, 1, 2)]);
    }

    #[test]
    fn test_end_date_is_inclusive() {
        let range = DateRange::from_args("2024-02-28", Some("2024-03-01"), None).unwrap();

        assert_eq!(range.days, 3);
        assert_eq!(
            range.dates().collect::<Vec<_>>(),
            vec![d(2024, 2, 28), d(2024, 2, 29), d(2024, 3, 1)]
        );
        assert_eq!(range.last(), d(2024, 3, 1));
    }

    #[test]
    fn test_days_count() {
        let range = DateRange::from_args("2024-12-30", None, Some(4)).unwrap();

        assert_eq!(range.last(), d(2025, 1, 2));
    }

    #[test]
    fn test_rejects_invalid_combinations() {
        assert!(DateRange::from_args("2024-01-02", Some("2024-01-03"), Some(2)).is_err());
        assert!(DateRange::from_args("2024-01-02", Some("2024-01-01"), None).is_err());
        assert!(DateRange::from_args("2024-01-02", None, Some(0)).is_err());
        assert!(matches!(
            DateRange::from_args("02/01/2024", None, None),
            Err(RoutineError::DateRange(_))
        ));
    }

    #[test]
    fn test_new_clamps_to_one_day() {
        assert_eq!(DateRange::new(d(2024, 1, 2), 0).days, 1);
    }
}
