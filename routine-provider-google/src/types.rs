//! Google Calendar v3 wire types, limited to the fields routine-sync uses.

use chrono::{DateTime, FixedOffset, NaiveDate};
use chrono_tz::Tz;
use routine_core::{EventTime, ExistingEvent, ProjectedEvent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<GoogleDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<GoogleDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleDateTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<FixedOffset>>,
    /// All-day events carry a date only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl GoogleDateTime {
    fn zoned(at: &DateTime<Tz>) -> Self {
        GoogleDateTime {
            date_time: Some(at.fixed_offset()),
            date: None,
            time_zone: Some(at.timezone().name().to_string()),
        }
    }

    fn event_time(&self) -> Option<EventTime> {
        match (self.date_time, self.date) {
            (Some(dt), _) => Some(EventTime::DateTime(dt)),
            (None, Some(d)) => Some(EventTime::Date(d)),
            (None, None) => None,
        }
    }
}

impl From<&ProjectedEvent> for GoogleEvent {
    fn from(event: &ProjectedEvent) -> Self {
        GoogleEvent {
            id: None,
            status: None,
            summary: Some(event.summary.clone()),
            description: Some(event.description.clone()),
            start: Some(GoogleDateTime::zoned(&event.start)),
            end: Some(GoogleDateTime::zoned(&event.end)),
        }
    }
}

impl GoogleEvent {
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }

    /// `None` when the event has no id.
    pub fn into_existing(self) -> Option<ExistingEvent> {
        Some(ExistingEvent {
            start: self.start.as_ref().and_then(GoogleDateTime::event_time),
            id: self.id?,
            summary: self.summary.unwrap_or_default(),
        })
    }
}

/// One page of `events.list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventList {
    #[serde(default)]
    pub items: Vec<GoogleEvent>,
    pub next_page_token: Option<String>,
}

/// Error envelope returned by Google APIs.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub message: String,
}

/// The `error.message` of a Google error body, or the raw text.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    #[test]
    fn test_payload_shape() {
        let start = chrono_tz::America::New_York.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        let event = ProjectedEvent {
            summary: "Standup".into(),
            description: "Room: 4".into(),
            start,
            end: start + TimeDelta::minutes(15),
        };

        let json = serde_json::to_value(GoogleEvent::from(&event)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "summary": "Standup",
                "description": "Room: 4",
                "start": {"dateTime": "2024-01-02T09:00:00-05:00", "timeZone": "America/New_York"},
                "end": {"dateTime": "2024-01-02T09:15:00-05:00", "timeZone": "America/New_York"},
            })
        );
    }

    #[test]
    fn test_list_page_to_existing_events() {
        let page: EventList = serde_json::from_str(
            r#"{
                "items": [
                    {"id": "a", "summary": "Standup", "start": {"dateTime": "2024-01-02T09:00:00Z"}},
                    {"id": "b", "start": {"date": "2024-01-02"}},
                    {"id": "c", "status": "cancelled"}
                ],
                "nextPageToken": "page-2"
            }"#,
        )
        .unwrap();

        assert_eq!(page.next_page_token.as_deref(), Some("page-2"));
        assert!(page.items[2].is_cancelled());

        let events: Vec<_> = page.items.into_iter().filter_map(GoogleEvent::into_existing).collect();
        assert_eq!(events[0].summary, "Standup");
        assert!(matches!(events[0].start, Some(EventTime::DateTime(_))));
        assert_eq!(events[1].summary, "");
        assert!(matches!(events[1].start, Some(EventTime::Date(_))));
        assert_eq!(events[2].start, None);
    }

    #[test]
    fn test_error_message() {
        let body = r#"{"error": {"code": 403, "message": "Rate Limit Exceeded"}}"#;
        assert_eq!(error_message(body), "Rate Limit Exceeded");
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
    }
}
