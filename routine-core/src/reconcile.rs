//! Reconciliation of projected events against the remote day.
//!
//! Events are matched purely by identity: the summary plus the zoned start
//! timestamp. A match is always re-sent as an update; remote events that match
//! nothing in the routine are deleted. Events that began on an earlier day and
//! run past midnight belong to that day and are left alone.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::batch::Operation;
use crate::error::{RoutineError, RoutineResult};
use crate::event::{EventTime, ExistingEvent};
use crate::projection::ProjectedEvent;
use crate::service::{CalendarService, EventQuery};

/// Identity used to pair a projected event with a remote one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey {
    pub summary: String,
    /// RFC 3339 start in the configured zone; empty for all-day events
    pub start: String,
}

impl MatchKey {
    pub fn new(summary: &str, start: String) -> Self {
        MatchKey {
            summary: summary.to_string(),
            start,
        }
    }

    pub fn for_existing(event: &ExistingEvent, tz: &Tz) -> Self {
        let start = event
            .start
            .as_ref()
            .map(|s| s.key_string(tz))
            .unwrap_or_default();

        MatchKey::new(&event.summary, start)
    }
}

/// Operations needed to bring one remote day in line with the routine.
#[derive(Debug, Default)]
pub struct OperationSet {
    pub creates: Vec<Operation>,
    pub updates: Vec<Operation>,
    pub deletes: Vec<Operation>,
}

impl OperationSet {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        (self.creates.len(), self.updates.len(), self.deletes.len())
    }

    /// Creates, then updates, then deletes.
    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.creates
            .iter()
            .chain(self.updates.iter())
            .chain(self.deletes.iter())
    }
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    calendar_id: String,
    tz: Tz,
}

impl Reconciler {
    pub fn new(calendar_id: &str, tz: Tz) -> Self {
        Reconciler {
            calendar_id: calendar_id.to_string(),
            tz,
        }
    }

    /// First and last instant of `date` in the configured zone.
    pub fn day_window(&self, date: NaiveDate) -> RoutineResult<(DateTime<Tz>, DateTime<Tz>)> {
        let last_instant = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN);
        Ok((self.local(date, NaiveTime::MIN)?, self.local(date, last_instant)?))
    }

    /// From the start of `first` to the start of the day after `last`.
    pub fn range_window(
        &self,
        first: NaiveDate,
        last: NaiveDate,
    ) -> RoutineResult<(DateTime<Tz>, DateTime<Tz>)> {
        let after = last
            .succ_opt()
            .ok_or_else(|| RoutineError::DateRange(format!("no day after {last}")))?;
        Ok((self.local(first, NaiveTime::MIN)?, self.local(after, NaiveTime::MIN)?))
    }

    fn local(&self, date: NaiveDate, time: NaiveTime) -> RoutineResult<DateTime<Tz>> {
        let naive = date.and_time(time);
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            // Zones that skip midnight start the day an hour later
            .or_else(|| {
                self.tz
                    .from_local_datetime(&(naive + chrono::TimeDelta::hours(1)))
                    .earliest()
            })
            .ok_or_else(|| RoutineError::NonexistentLocalTime {
                date,
                time,
                tz: self.tz.name().to_string(),
            })
    }

    pub async fn list_window<S: CalendarService>(
        &self,
        service: &S,
        from: DateTime<Tz>,
        to: DateTime<Tz>,
    ) -> RoutineResult<Vec<ExistingEvent>> {
        let query = EventQuery::single_events(&self.calendar_id, from.fixed_offset(), to.fixed_offset());
        Ok(service.list_events(&query).await?)
    }

    /// Fetch the remote day and work out what has to change.
    pub async fn reconcile<S: CalendarService>(
        &self,
        service: &S,
        date: NaiveDate,
        projected: Vec<ProjectedEvent>,
    ) -> RoutineResult<OperationSet> {
        let (day_start, day_end) = self.day_window(date)?;
        debug!(%date, "Syncing using day_start: {} and day_end: {}", day_start.to_rfc3339(), day_end.to_rfc3339());

        let listed = self.list_window(service, day_start, day_end).await?;
        let existing = self.starting_from(day_start, listed);
        Ok(self.plan(projected, &existing))
    }

    /// Drop listed events that started before `day_start`.
    ///
    /// Listings return every event overlapping the window, so yesterday's
    /// late entry shows up in today's listing.
    pub fn starting_from(&self, day_start: DateTime<Tz>, listed: Vec<ExistingEvent>) -> Vec<ExistingEvent> {
        let cutoff = day_start.fixed_offset();
        let first_day = day_start.date_naive();

        let (carried, existing): (Vec<_>, Vec<_>) = listed.into_iter().partition(|event| match &event.start {
            Some(EventTime::DateTime(start)) => *start < cutoff,
            Some(EventTime::Date(date)) => *date < first_day,
            None => false,
        });

        for event in &carried {
            debug!(id = %event.id, summary = %event.summary, "Skipping event carried over from the previous day");
        }

        existing
    }

    /// Pure diff between the projected events and a snapshot of the remote day.
    pub fn plan(&self, projected: Vec<ProjectedEvent>, existing: &[ExistingEvent]) -> OperationSet {
        let mut existing_ids: HashMap<MatchKey, &str> = HashMap::new();
        let mut remote_order: Vec<MatchKey> = Vec::new();

        for event in existing {
            let key = MatchKey::for_existing(event, &self.tz);
            match existing_ids.insert(key.clone(), &event.id) {
                // Last one wins; the earlier event will be treated as orphaned
                Some(previous) => warn!(
                    summary = %key.summary,
                    start = %key.start,
                    "Duplicate remote events {} and {}; only the latter is matched",
                    previous,
                    event.id
                ),
                None => remote_order.push(key),
            }
        }

        let mut ops = OperationSet::default();
        let mut matched: HashSet<MatchKey> = HashSet::new();

        for event in projected {
            let key = event.match_key();

            match existing_ids.get(&key) {
                Some(id) if !matched.contains(&key) => {
                    debug!(summary = %key.summary, start = %key.start, "Found key in map");
                    ops.updates.push(Operation::update(id.to_string(), event));
                    matched.insert(key);
                }
                _ => {
                    debug!(summary = %key.summary, start = %key.start, "Unable to find key in map");
                    ops.creates.push(Operation::insert(event));
                }
            }
        }

        for key in remote_order {
            if !matched.contains(&key) {
                if let Some(id) = existing_ids.get(&key) {
                    ops.deletes.push(Operation::delete(id.to_string()));
                }
            }
        }

        let (creates, updates, deletes) = ops.counts();
        debug!("Batching: {} creates, {} updates, {} deletes", creates, updates, deletes);

        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::OperationKind;
    use crate::testing::FakeCalendar;
    use chrono::TimeDelta;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    fn projected(summary: &str, hour: u32, minute: u32) -> ProjectedEvent {
        let start = chrono_tz::Europe::London
            .with_ymd_and_hms(2024, 1, 2, hour, minute, 0)
            .unwrap();
        ProjectedEvent {
            summary: summary.to_string(),
            description: String::new(),
            start,
            end: start + TimeDelta::minutes(30),
        }
    }

    fn existing(id: &str, summary: &str, start: &str) -> ExistingEvent {
        ExistingEvent {
            id: id.to_string(),
            summary: summary.to_string(),
            start: Some(EventTime::DateTime(DateTime::parse_from_rfc3339(start).unwrap())),
        }
    }

    fn reconciler() -> Reconciler {
        Reconciler::new("primary", chrono_tz::Europe::London)
    }

    fn target_ids(ops: &[Operation]) -> Vec<String> {
        ops.iter()
            .filter_map(|op| match &op.kind {
                OperationKind::Update(id, _) | OperationKind::Delete(id) => Some(id.clone()),
                OperationKind::Insert(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_plan_against_empty_calendar_only_inserts() {
        let ops = reconciler().plan(vec![projected("Standup", 9, 0), projected("Focus", 9, 15)], &[]);

        assert_eq!(ops.counts(), (2, 0, 0));
        assert!(ops.creates.iter().all(|op| matches!(op.kind, OperationKind::Insert(_))));
    }

    #[test]
    fn test_plan_exact_match_only_updates() {
        let remote = vec![
            existing("a", "Standup", "2024-01-02T09:00:00Z"),
            existing("b", "Focus", "2024-01-02T09:15:00+00:00"),
        ];

        let ops = reconciler().plan(vec![projected("Standup", 9, 0), projected("Focus", 9, 15)], &remote);

        assert_eq!(ops.counts(), (0, 2, 0));
        assert_eq!(target_ids(&ops.updates), vec!["a", "b"]);
    }

    #[test]
    fn test_plan_matches_across_offsets() {
        // Same instant reported in another zone still matches
        let remote = vec![existing("a", "Standup", "2024-01-02T10:00:00+01:00")];

        let ops = reconciler().plan(vec![projected("Standup", 9, 0)], &remote);

        assert_eq!(ops.counts(), (0, 1, 0));
    }

    #[test]
    fn test_plan_deletes_unmatched_remote_events() {
        let remote = vec![
            existing("keep", "Standup", "2024-01-02T09:00:00Z"),
            existing("moved", "Focus", "2024-01-02T14:00:00Z"),
            existing("stale", "Old habit", "2024-01-02T18:00:00Z"),
        ];

        let ops = reconciler().plan(vec![projected("Standup", 9, 0), projected("Focus", 9, 15)], &remote);

        assert_eq!(ops.counts(), (1, 1, 2));
        assert_eq!(target_ids(&ops.deletes), vec!["moved", "stale"]);
    }

    #[test]
    fn test_plan_all_day_events_never_match() {
        let remote = vec![ExistingEvent {
            id: "holiday".to_string(),
            summary: "Standup".to_string(),
            start: Some(EventTime::Date(date())),
        }];

        let ops = reconciler().plan(vec![projected("Standup", 9, 0)], &remote);

        assert_eq!(ops.counts(), (1, 0, 1));
        assert_eq!(MatchKey::for_existing(&remote[0], &chrono_tz::Europe::London).start, "");
    }

    #[test]
    fn test_plan_duplicate_remote_keys_last_wins() {
        let remote = vec![
            existing("first", "Standup", "2024-01-02T09:00:00Z"),
            existing("second", "Standup", "2024-01-02T09:00:00Z"),
        ];

        let ops = reconciler().plan(vec![projected("Standup", 9, 0)], &remote);

        assert_eq!(ops.counts(), (0, 1, 0));
        assert_eq!(target_ids(&ops.updates), vec!["second"]);
    }

    #[test]
    fn test_plan_duplicate_projected_keys_update_once() {
        let remote = vec![existing("a", "Standup", "2024-01-02T09:00:00Z")];

        let ops = reconciler().plan(vec![projected("Standup", 9, 0), projected("Standup", 9, 0)], &remote);

        assert_eq!(ops.counts(), (1, 1, 0));
    }

    #[test]
    fn test_day_window_spans_local_day() {
        let (start, end) = Reconciler::new("primary", chrono_tz::America::New_York)
            .day_window(date())
            .unwrap();

        assert_eq!(start.to_rfc3339(), "2024-01-02T00:00:00-05:00");
        assert_eq!(end.to_rfc3339(), "2024-01-02T23:59:59.999999-05:00");
    }

    #[test]
    fn test_range_window_ends_at_next_midnight() {
        let last = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        let (start, end) = reconciler().range_window(date(), last).unwrap();

        assert_eq!(start.to_rfc3339(), "2024-01-02T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-01-05T00:00:00+00:00");
    }

    #[tokio::test]
    async fn test_reconcile_queries_single_events_for_day() {
        let calendar = FakeCalendar::with_events(vec![existing("a", "Standup", "2024-01-02T09:00:00Z")]);

        let ops = reconciler()
            .reconcile(&calendar, date(), vec![projected("Standup", 9, 0)])
            .await
            .unwrap();

        assert_eq!(ops.counts(), (0, 1, 0));
        let queries = calendar.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].calendar_id, "primary");
        assert!(queries[0].single_events && queries[0].order_by_start);
        assert_eq!(queries[0].time_min.to_rfc3339(), "2024-01-02T00:00:00+00:00");
    }

    #[test]
    fn test_events_carried_over_midnight_are_kept() {
        let reconciler = reconciler();
        let (day_start, _) = reconciler.day_window(date()).unwrap();
        let listed = vec![
            existing("late", "Wind down", "2024-01-01T23:00:00Z"),
            existing("a", "Standup", "2024-01-02T09:00:00Z"),
            ExistingEvent {
                id: "trip".to_string(),
                summary: "Holiday".to_string(),
                start: Some(EventTime::Date(NaiveDate::from_ymd_opt(2023, 12, 30).unwrap())),
            },
        ];

        let existing = reconciler.starting_from(day_start, listed);
        let ops = reconciler.plan(vec![projected("Standup", 9, 0)], &existing);

        assert_eq!(existing.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(ops.counts(), (0, 1, 0));
    }

    #[tokio::test]
    async fn test_reconcile_propagates_list_failure() {
        let calendar = FakeCalendar::default();
        calendar.fail_list(crate::service::ServiceError::Http {
            status: 403,
            message: "rateLimitExceeded".to_string(),
        });

        let result = reconciler().reconcile(&calendar, date(), vec![]).await;

        assert!(matches!(result, Err(RoutineError::Service(_))));
    }
}
