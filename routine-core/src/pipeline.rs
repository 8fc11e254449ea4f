//! One sync pass: parse, project, reconcile and execute, date by date.

use std::fmt;
use std::path::Path;

use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::{debug, error, info};

use crate::batch::{BatchExecutor, BatchReport, Operation, RetryPolicy};
use crate::constants::{DEFAULT_BATCH_SIZE, DEFAULT_CALENDAR_ID, DEFAULT_MAX_RETRIES};
use crate::date_range::DateRange;
use crate::diff_kind::DiffKind;
use crate::error::RoutineResult;
use crate::projection::EventProjector;
use crate::reconcile::{OperationSet, Reconciler};
use crate::schedule::{self, Entry};
use crate::service::CalendarService;

/// Parameters shared by every stage of a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    pub calendar_id: String,
    pub timezone: Tz,
    pub batch_size: usize,
    pub max_retries: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            calendar_id: DEFAULT_CALENDAR_ID.to_string(),
            timezone: chrono_tz::Europe::London,
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Counters for one or more synced dates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub chunks_succeeded: usize,
    pub chunks_failed: usize,
    /// Dates whose remote state could not be fetched
    pub failed_dates: Vec<NaiveDate>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.chunks_failed == 0 && self.failed_dates.is_empty()
    }

    pub fn merge(&mut self, other: SyncReport) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.chunks_succeeded += other.chunks_succeeded;
        self.chunks_failed += other.chunks_failed;
        self.failed_dates.extend(other.failed_dates);
    }

    fn record_batches(&mut self, batches: &BatchReport) {
        self.chunks_succeeded += batches.chunks_succeeded;
        self.chunks_failed += batches.chunks_failed;
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} deleted ({} batches ok, {} failed)",
            self.created, self.updated, self.deleted, self.chunks_succeeded, self.chunks_failed
        )?;
        if !self.failed_dates.is_empty() {
            write!(f, ", {} dates failed", self.failed_dates.len())?;
        }
        Ok(())
    }
}

pub struct SyncPipeline<S> {
    service: S,
    projector: EventProjector,
    reconciler: Reconciler,
    executor: BatchExecutor,
}

impl<S: CalendarService> SyncPipeline<S> {
    pub fn new(service: S, options: &SyncOptions) -> Self {
        SyncPipeline {
            service,
            projector: EventProjector::new(options.timezone),
            reconciler: Reconciler::new(&options.calendar_id, options.timezone),
            executor: BatchExecutor::new(
                &options.calendar_id,
                options.batch_size,
                RetryPolicy::with_max_retries(options.max_retries),
            ),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Reconcile one date without touching the calendar.
    pub async fn plan_day(&self, entries: &[Entry], date: NaiveDate) -> RoutineResult<OperationSet> {
        let projected = self.projector.project_all(entries, date);
        self.reconciler.reconcile(&self.service, date, projected).await
    }

    /// Bring one date in line with `entries`. Creates, updates and deletes are
    /// executed in that order, each in its own run of chunks.
    #[tracing::instrument(skip_all, fields(date = %date))]
    pub async fn sync_day(&self, entries: &[Entry], date: NaiveDate) -> RoutineResult<SyncReport> {
        let ops = self.plan_day(entries, date).await?;
        let (created, updated, deleted) = ops.counts();

        let mut report = SyncReport {
            created,
            updated,
            deleted,
            ..SyncReport::default()
        };

        let runs = [
            (DiffKind::Create, ops.creates),
            (DiffKind::Update, ops.updates),
            (DiffKind::Delete, ops.deletes),
        ];

        for (kind, operations) in runs {
            if operations.is_empty() {
                continue;
            }
            debug!("Sending {} {}", operations.len(), kind.label());
            let batches = self.executor.execute_all(&self.service, operations).await;
            report.record_batches(&batches);
        }

        Ok(report)
    }

    /// Sync every date in `range` in order. A date that fails is logged and
    /// recorded; the remaining dates still run.
    pub async fn sync_range(&self, entries: &[Entry], range: &DateRange) -> SyncReport {
        let mut report = SyncReport::default();

        for date in range.dates() {
            match self.sync_day(entries, date).await {
                Ok(day) => {
                    debug!(%date, "Synced: {}", day);
                    report.merge(day);
                }
                Err(e) => {
                    error!(%date, "Sync failed: {}", e);
                    report.failed_dates.push(date);
                }
            }
        }

        report
    }

    /// Parse the routine file once, then sync the range.
    pub async fn sync_file(&self, path: &Path, range: &DateRange) -> RoutineResult<SyncReport> {
        let entries = schedule::load(path)?;
        info!(
            path = %path.display(),
            "Loaded {} entries, syncing {} to {}",
            entries.len(),
            range.start,
            range.last()
        );

        Ok(self.sync_range(&entries, range).await)
    }

    /// Delete every single event in the range, all-day ones included.
    pub async fn clear_range(&self, range: &DateRange) -> RoutineResult<SyncReport> {
        let (from, to) = self.reconciler.range_window(range.start, range.last())?;
        let existing = self.reconciler.list_window(&self.service, from, to).await?;
        info!("Deleting {} events between {} and {}", existing.len(), from.to_rfc3339(), to.to_rfc3339());

        let deletes: Vec<Operation> = existing
            .into_iter()
            .map(|event| Operation::delete(event.id))
            .collect();

        let mut report = SyncReport {
            deleted: deletes.len(),
            ..SyncReport::default()
        };
        let batches = self.executor.execute_all(&self.service, deletes).await;
        report.record_batches(&batches);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::OperationKind;
    use crate::error::RoutineError;
    use crate::event::{EventTime, ExistingEvent};
    use crate::service::ServiceError;
    use crate::testing::FakeCalendar;
    use chrono::DateTime;

    const ROUTINE: &str = "\
| Time | Activity | Notes |
|------|----------|-------|
| 09:00 | Standup | Daily |
| 09:15 | Focus Block | |
";

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn existing(id: &str, summary: &str, start: &str) -> ExistingEvent {
        ExistingEvent {
            id: id.to_string(),
            summary: summary.to_string(),
            start: Some(EventTime::DateTime(DateTime::parse_from_rfc3339(start).unwrap())),
        }
    }

    fn pipeline(calendar: FakeCalendar, batch_size: usize) -> SyncPipeline<FakeCalendar> {
        let options = SyncOptions {
            batch_size,
            ..SyncOptions::default()
        };
        SyncPipeline::new(calendar, &options)
    }

    fn kinds(batch: &[crate::service::SubRequest]) -> Vec<DiffKind> {
        batch.iter().map(|r| r.operation.diff_kind()).collect()
    }

    #[tokio::test]
    async fn test_sync_day_into_empty_calendar() {
        let entries = schedule::parse(ROUTINE).unwrap();
        let pipeline = pipeline(FakeCalendar::default(), 10);

        let report = pipeline.sync_day(&entries, date(2)).await.unwrap();

        assert_eq!((report.created, report.updated, report.deleted), (2, 0, 0));
        assert_eq!(report.chunks_succeeded, 1);
        let events = pipeline.service().events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].summary, "Standup");
    }

    #[tokio::test]
    async fn test_sync_day_sends_creates_updates_deletes_separately() {
        let calendar = FakeCalendar::with_events(vec![
            existing("a", "Standup", "2024-01-02T09:00:00Z"),
            existing("b", "Old habit", "2024-01-02T20:00:00Z"),
        ]);
        let entries = schedule::parse(ROUTINE).unwrap();
        let pipeline = pipeline(calendar, 10);

        let report = pipeline.sync_day(&entries, date(2)).await.unwrap();

        assert_eq!((report.created, report.updated, report.deleted), (1, 1, 1));
        let batches = pipeline.service().batches();
        assert_eq!(batches.len(), 3);
        assert_eq!(kinds(&batches[0]), vec![DiffKind::Create]);
        assert_eq!(kinds(&batches[1]), vec![DiffKind::Update]);
        assert_eq!(kinds(&batches[2]), vec![DiffKind::Delete]);
        assert!(matches!(&batches[1][0].operation, OperationKind::Update(id, _) if id == "a"));
    }

    #[tokio::test]
    async fn test_resync_is_all_updates() {
        let entries = schedule::parse(ROUTINE).unwrap();
        let pipeline = pipeline(FakeCalendar::default(), 10);

        pipeline.sync_day(&entries, date(2)).await.unwrap();
        let second = pipeline.sync_day(&entries, date(2)).await.unwrap();

        assert_eq!((second.created, second.updated, second.deleted), (0, 2, 0));
        assert_eq!(pipeline.service().events().len(), 2);
    }

    #[tokio::test]
    async fn test_sync_range_continues_after_failed_date() {
        let calendar = FakeCalendar::default();
        calendar.fail_list(ServiceError::Transport("connection reset".into()));
        let entries = schedule::parse(ROUTINE).unwrap();
        let pipeline = pipeline(calendar, 10);

        let report = pipeline.sync_range(&entries, &DateRange::new(date(2), 3)).await;

        assert_eq!(report.failed_dates, vec![date(2), date(3), date(4)]);
        assert!(!report.is_clean());
        assert_eq!(pipeline.service().queries().len(), 3);
    }

    #[tokio::test]
    async fn test_sync_range_covers_each_date() {
        let entries = schedule::parse(ROUTINE).unwrap();
        let pipeline = pipeline(FakeCalendar::default(), 1);

        let report = pipeline.sync_range(&entries, &DateRange::new(date(2), 2)).await;

        assert_eq!(report.created, 4);
        assert_eq!(report.chunks_succeeded, 4);
        assert!(report.is_clean());
        let days: Vec<_> = pipeline
            .service()
            .queries()
            .iter()
            .map(|q| q.time_min.date_naive())
            .collect();
        assert_eq!(days, vec![date(2), date(3)]);
    }

    #[tokio::test]
    async fn test_sync_file_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routine.md");
        std::fs::write(&path, "| When | What |\n| 09:00 | Standup |\n").unwrap();

        let result = pipeline(FakeCalendar::default(), 10)
            .sync_file(&path, &DateRange::single(date(2)))
            .await;

        assert!(matches!(result, Err(RoutineError::MissingColumn("Time"))));
    }

    #[tokio::test]
    async fn test_clear_range_deletes_everything_in_window() {
        let calendar = FakeCalendar::with_events(vec![
            existing("a", "Standup", "2024-01-02T09:00:00Z"),
            existing("b", "Lunch", "2024-01-03T12:00:00Z"),
            existing("c", "Outside", "2024-01-05T09:00:00Z"),
        ]);
        let pipeline = pipeline(calendar, 10);

        let report = pipeline.clear_range(&DateRange::new(date(2), 2)).await.unwrap();

        assert_eq!(report.deleted, 2);
        let remaining: Vec<_> = pipeline.service().events().into_iter().map(|e| e.id).collect();
        assert_eq!(remaining, vec!["c"]);
        let query = &pipeline.service().queries()[0];
        assert_eq!(query.time_max.to_rfc3339(), "2024-01-04T00:00:00+00:00");
    }

    #[test]
    fn test_report_summary_line() {
        let report = SyncReport {
            created: 2,
            updated: 1,
            deleted: 0,
            chunks_succeeded: 2,
            chunks_failed: 1,
            failed_dates: vec![date(3)],
        };

        assert_eq!(report.to_string(), "2 created, 1 updated, 0 deleted (2 batches ok, 1 failed), 1 dates failed");
    }
}
