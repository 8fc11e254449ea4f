//! Google Calendar backend for routine-sync.
//!
//! `GoogleCalendar` talks to the Calendar v3 REST API and its batch endpoint;
//! `TokenFileAuth` supplies access tokens from a stored OAuth session.

pub mod app_config;
pub mod batch;
pub mod calendar;
pub mod session;
pub mod types;

pub use app_config::Credentials;
pub use calendar::GoogleCalendar;
pub use session::{SessionData, TokenFileAuth};
