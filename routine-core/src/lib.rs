//! Core types and pipeline for routine-sync.
//!
//! This crate turns a plain-text routine table into calendar events and keeps a
//! remote calendar in step with it:
//! - `schedule` parses the table into timed entries
//! - `projection` places entries on a concrete date
//! - `reconcile` diffs projected events against the remote day
//! - `batch` applies the resulting operations in retried batches
//! - `watch` re-runs the pipeline when the source file changes
//!
//! The calendar provider and credentials live behind the traits in `service`.

pub mod batch;
pub mod config;
pub mod constants;
pub mod date_range;
pub mod diff_kind;
pub mod error;
pub mod event;
pub mod pipeline;
pub mod projection;
pub mod reconcile;
pub mod schedule;
pub mod service;
pub mod watch;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchExecutor, BatchReport, Operation, OperationKind, RetryPolicy};
pub use config::RoutineConfig;
pub use date_range::DateRange;
pub use diff_kind::DiffKind;
pub use error::{RoutineError, RoutineResult};
pub use event::{EventTime, ExistingEvent};
pub use pipeline::{SyncOptions, SyncPipeline, SyncReport};
pub use projection::{EventProjector, ProjectedEvent};
pub use reconcile::{MatchKey, OperationSet, Reconciler};
pub use schedule::Entry;
pub use service::{AuthProvider, CalendarService, EventQuery, ServiceError, SubRequest, SubResponse};
