//! Batched execution of calendar operations.
//!
//! Operations are split into contiguous chunks. Each chunk goes out as one
//! bundled request; if the bundle fails with a rate-limit or server status the
//! whole chunk is retried after an exponential backoff. A chunk that can't be
//! delivered is logged and skipped, and the next chunk is still attempted.

use std::fmt;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::constants::{BACKOFF_BASE_MILLIS, DEFAULT_MAX_RETRIES};
use crate::diff_kind::DiffKind;
use crate::projection::ProjectedEvent;
use crate::service::{CalendarService, ServiceError, SubRequest, SubResponse};

/// What a single operation does to the remote calendar.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationKind {
    Insert(ProjectedEvent),
    /// Target event id and the replacement payload
    Update(String, ProjectedEvent),
    Delete(String),
}

impl OperationKind {
    pub fn diff_kind(&self) -> DiffKind {
        match self {
            OperationKind::Insert(_) => DiffKind::Create,
            OperationKind::Update(..) => DiffKind::Update,
            OperationKind::Delete(_) => DiffKind::Delete,
        }
    }

    pub fn payload(&self) -> Option<&ProjectedEvent> {
        match self {
            OperationKind::Insert(event) | OperationKind::Update(_, event) => Some(event),
            OperationKind::Delete(_) => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Insert(event) | OperationKind::Update(_, event) => write!(
                f,
                "{} {} {} ({}m)",
                self.diff_kind(),
                event.start.format("%Y-%m-%d %H:%M"),
                event.summary,
                event.end.signed_duration_since(event.start).num_minutes()
            ),
            OperationKind::Delete(id) => write!(f, "{} {}", self.diff_kind(), id),
        }
    }
}

/// Called once with the sub-request id and its outcome after the owning
/// bundle was delivered.
pub type Callback = Box<dyn FnOnce(&str, SubResponse) + Send>;

pub struct Operation {
    pub kind: OperationKind,
    callback: Callback,
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation").field("kind", &self.kind).finish_non_exhaustive()
    }
}

impl Operation {
    pub fn new(kind: OperationKind) -> Self {
        Operation {
            kind,
            callback: Box::new(log_outcome),
        }
    }

    pub fn insert(event: ProjectedEvent) -> Self {
        Self::new(OperationKind::Insert(event))
    }

    pub fn update(target_id: String, event: ProjectedEvent) -> Self {
        Self::new(OperationKind::Update(target_id, event))
    }

    pub fn delete(target_id: String) -> Self {
        Self::new(OperationKind::Delete(target_id))
    }

    pub fn with_callback(mut self, callback: impl FnOnce(&str, SubResponse) + Send + 'static) -> Self {
        self.callback = Box::new(callback);
        self
    }
}

/// Default completion callback.
fn log_outcome(request_id: &str, response: SubResponse) {
    match response {
        Ok(Some(_)) => debug!("Request {} succeeded: Processed", request_id),
        Ok(None) => debug!("Request {} succeeded: Deleted", request_id),
        Err(e) => error!("Request {} failed: {}", request_id, e),
    }
}

/// Split `items` into contiguous chunks of at most `size` elements.
pub fn chunk<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter().peekable();

    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(size).collect());
    }

    chunks
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(BACKOFF_BASE_MILLIS),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        RetryPolicy {
            max_retries,
            ..Self::default()
        }
    }

    /// `base × 2^attempt`, with attempt counted from zero.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }
}

/// Result of sending one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkOutcome {
    pub succeeded: bool,
    pub attempts: u32,
    pub waited: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub chunks_succeeded: usize,
    pub chunks_failed: usize,
    pub waited: Duration,
}

#[derive(Debug, Clone)]
pub struct BatchExecutor {
    calendar_id: String,
    batch_size: usize,
    retry: RetryPolicy,
}

impl BatchExecutor {
    pub fn new(calendar_id: &str, batch_size: usize, retry: RetryPolicy) -> Self {
        BatchExecutor {
            calendar_id: calendar_id.to_string(),
            batch_size: batch_size.max(1),
            retry,
        }
    }

    /// Send every chunk in order. A failed chunk doesn't stop the rest.
    pub async fn execute_all<S: CalendarService>(&self, service: &S, operations: Vec<Operation>) -> BatchReport {
        let mut report = BatchReport::default();

        for (index, ops) in chunk(operations, self.batch_size).into_iter().enumerate() {
            let outcome = self.execute_chunk(service, index, ops).await;
            report.waited += outcome.waited;

            if outcome.succeeded {
                report.chunks_succeeded += 1;
            } else {
                report.chunks_failed += 1;
            }
        }

        report
    }

    #[tracing::instrument(skip_all, fields(chunk = index, size = operations.len()))]
    pub async fn execute_chunk<S: CalendarService>(
        &self,
        service: &S,
        index: usize,
        operations: Vec<Operation>,
    ) -> ChunkOutcome {
        let (requests, callbacks): (Vec<SubRequest>, Vec<Callback>) = operations
            .into_iter()
            .enumerate()
            .map(|(i, op)| {
                let request = SubRequest {
                    request_id: i.to_string(),
                    operation: op.kind,
                };
                (request, op.callback)
            })
            .unzip();

        let mut attempt = 0;
        let mut waited = Duration::ZERO;

        loop {
            match service.batch_execute(&self.calendar_id, &requests).await {
                Ok(responses) => {
                    deliver(&requests, callbacks, responses);
                    return ChunkOutcome {
                        succeeded: true,
                        attempts: attempt + 1,
                        waited,
                    };
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        attempt,
                        status = e.status(),
                        "Rate limit or server error, retrying in {:.1}s...",
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    waited += delay;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        error!(attempt, "Max retries exceeded for batch request: {}", e);
                    } else {
                        error!(attempt, "Batch request failed: {}", e);
                    }
                    return ChunkOutcome {
                        succeeded: false,
                        attempts: attempt + 1,
                        waited,
                    };
                }
            }
        }
    }
}

fn deliver(requests: &[SubRequest], callbacks: Vec<Callback>, responses: Vec<SubResponse>) {
    if responses.len() != requests.len() {
        warn!(
            expected = requests.len(),
            received = responses.len(),
            "Batch response count mismatch"
        );
    }

    let mut responses = responses.into_iter();

    for (request, callback) in requests.iter().zip(callbacks) {
        let response = responses.next().unwrap_or_else(|| {
            Err(ServiceError::Decode(format!(
                "no response for request {}",
                request.request_id
            )))
        });
        callback(&request.request_id, response);
    }
}
