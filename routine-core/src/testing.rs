//! In-memory calendar used by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::batch::OperationKind;
use crate::event::{EventTime, ExistingEvent};
use crate::service::{CalendarService, EventQuery, ServiceError, SubRequest, SubResponse};

#[derive(Default)]
pub struct FakeCalendar {
    events: Mutex<Vec<ExistingEvent>>,
    queries: Mutex<Vec<EventQuery>>,
    batches: Mutex<Vec<Vec<SubRequest>>>,
    list_failure: Mutex<Option<ServiceError>>,
    batch_failures: Mutex<VecDeque<ServiceError>>,
    response_limit: Mutex<Option<usize>>,
    list_delay: Mutex<Option<Duration>>,
}

impl FakeCalendar {
    pub fn with_events(events: Vec<ExistingEvent>) -> Self {
        let calendar = FakeCalendar::default();
        *calendar.events.lock().unwrap() = events;
        calendar
    }

    /// Every later `list_events` call fails with `error`.
    pub fn fail_list(&self, error: ServiceError) {
        *self.list_failure.lock().unwrap() = Some(error);
    }

    /// The next `batch_execute` calls fail with these errors, in order.
    pub fn fail_batches(&self, errors: Vec<ServiceError>) {
        self.batch_failures.lock().unwrap().extend(errors);
    }

    /// Successful bundles answer at most `limit` sub-requests.
    pub fn truncate_responses(&self, limit: usize) {
        *self.response_limit.lock().unwrap() = Some(limit);
    }

    /// Every later `list_events` call waits `delay` before answering.
    pub fn delay_list(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = Some(delay);
    }

    pub fn queries(&self) -> Vec<EventQuery> {
        self.queries.lock().unwrap().clone()
    }

    /// Every bundle received, failed attempts included.
    pub fn batches(&self) -> Vec<Vec<SubRequest>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<ExistingEvent> {
        self.events.lock().unwrap().clone()
    }

    fn apply(&self, request: &SubRequest) -> SubResponse {
        let mut events = self.events.lock().unwrap();

        match &request.operation {
            OperationKind::Insert(event) => {
                let created = ExistingEvent {
                    id: format!("evt-{}", events.len() + 1),
                    summary: event.summary.clone(),
                    start: Some(EventTime::DateTime(event.start.fixed_offset())),
                };
                events.push(created.clone());
                Ok(Some(created))
            }
            OperationKind::Update(id, event) => {
                let existing = events
                    .iter_mut()
                    .find(|e| &e.id == id)
                    .ok_or_else(|| ServiceError::Http {
                        status: 404,
                        message: format!("no event {id}"),
                    })?;
                existing.summary = event.summary.clone();
                existing.start = Some(EventTime::DateTime(event.start.fixed_offset()));
                Ok(Some(existing.clone()))
            }
            OperationKind::Delete(id) => {
                events.retain(|e| &e.id != id);
                Ok(None)
            }
        }
    }
}

impl CalendarService for FakeCalendar {
    async fn list_events(&self, query: &EventQuery) -> Result<Vec<ExistingEvent>, ServiceError> {
        self.queries.lock().unwrap().push(query.clone());

        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.list_failure.lock().unwrap().clone() {
            return Err(error);
        }

        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| match &e.start {
                Some(EventTime::DateTime(start)) => *start >= query.time_min && *start <= query.time_max,
                Some(EventTime::Date(date)) => *date == query.time_min.date_naive(),
                None => false,
            })
            .cloned()
            .collect())
    }

    async fn batch_execute(
        &self,
        _calendar_id: &str,
        requests: &[SubRequest],
    ) -> Result<Vec<SubResponse>, ServiceError> {
        self.batches.lock().unwrap().push(requests.to_vec());

        if let Some(error) = self.batch_failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let limit = self.response_limit.lock().unwrap().unwrap_or(requests.len());
        Ok(requests.iter().take(limit).map(|r| self.apply(r)).collect())
    }
}
