//! Collaborator interfaces: the calendar provider and its credentials.
//!
//! The core never talks to the network itself. A `CalendarService` lists the
//! events of a time window and applies bundles of operations; an
//! `AuthProvider` hands out a valid access token on demand.

use std::future::Future;

use chrono::{DateTime, FixedOffset};
use thiserror::Error;

use crate::batch::OperationKind;
use crate::constants::TRANSIENT_STATUSES;
use crate::event::ExistingEvent;

/// Errors reported by a calendar provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ServiceError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failed call is worth repeating after a pause.
    pub fn is_transient(&self) -> bool {
        self.status()
            .is_some_and(|status| TRANSIENT_STATUSES.contains(&status))
    }
}

/// Listing parameters for one calendar window.
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    pub calendar_id: String,
    pub time_min: DateTime<FixedOffset>,
    pub time_max: DateTime<FixedOffset>,
    /// Expand recurring events into their instances
    pub single_events: bool,
    pub order_by_start: bool,
}

impl EventQuery {
    pub fn single_events(
        calendar_id: &str,
        time_min: DateTime<FixedOffset>,
        time_max: DateTime<FixedOffset>,
    ) -> Self {
        EventQuery {
            calendar_id: calendar_id.to_string(),
            time_min,
            time_max,
            single_events: true,
            order_by_start: true,
        }
    }
}

/// One operation inside a bundled request, tagged with its id in the chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct SubRequest {
    pub request_id: String,
    pub operation: OperationKind,
}

/// Outcome of one sub-request. Deletes succeed with `None`.
pub type SubResponse = Result<Option<ExistingEvent>, ServiceError>;

pub trait CalendarService {
    fn list_events(
        &self,
        query: &EventQuery,
    ) -> impl Future<Output = Result<Vec<ExistingEvent>, ServiceError>> + Send;

    /// Send every request as one bundle.
    ///
    /// `Err` means the bundle as a whole failed. On `Ok`, the responses line
    /// up with `requests` by position.
    fn batch_execute(
        &self,
        calendar_id: &str,
        requests: &[SubRequest],
    ) -> impl Future<Output = Result<Vec<SubResponse>, ServiceError>> + Send;
}

pub trait AuthProvider {
    fn access_token(&self) -> impl Future<Output = Result<String, ServiceError>> + Send;
}
