//! Google Calendar implementation of `CalendarService`.

use reqwest::header::CONTENT_TYPE;
use routine_core::{AuthProvider, CalendarService, EventQuery, ExistingEvent, ServiceError, SubRequest, SubResponse};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::batch::{boundary_from_content_type, decode, encode, events_url, new_boundary};
use crate::types::{EventList, GoogleEvent, error_message};

const BATCH_URL: &str = "https://www.googleapis.com/batch/calendar/v3";

pub struct GoogleCalendar<A> {
    auth: A,
    http: reqwest::Client,
}

impl<A: AuthProvider> GoogleCalendar<A> {
    pub fn new(auth: A) -> Self {
        GoogleCalendar {
            auth,
            http: reqwest::Client::new(),
        }
    }
}

fn transport(e: reqwest::Error) -> ServiceError {
    ServiceError::Transport(e.to_string())
}

/// Decode a JSON body, turning non-2xx statuses into `ServiceError::Http`.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ServiceError> {
    let status = response.status();
    let text = response.text().await.map_err(transport)?;

    if !status.is_success() {
        return Err(ServiceError::Http {
            status: status.as_u16(),
            message: error_message(&text),
        });
    }

    serde_json::from_str(&text).map_err(|e| ServiceError::Decode(e.to_string()))
}

impl<A: AuthProvider + Sync> CalendarService for GoogleCalendar<A> {
    async fn list_events(&self, query: &EventQuery) -> Result<Vec<ExistingEvent>, ServiceError> {
        let token = self.auth.access_token().await?;
        let url = events_url(&query.calendar_id, None)?;

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(url.clone()).bearer_auth(&token).query(&[
                ("timeMin", query.time_min.to_rfc3339()),
                ("timeMax", query.time_max.to_rfc3339()),
                ("singleEvents", query.single_events.to_string()),
            ]);
            if query.order_by_start {
                request = request.query(&[("orderBy", "startTime")]);
            }
            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page)]);
            }

            let page: EventList = read_json(request.send().await.map_err(transport)?).await?;

            events.extend(
                page.items
                    .into_iter()
                    .filter(|e| !e.is_cancelled())
                    .filter_map(GoogleEvent::into_existing),
            );

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(calendar = %query.calendar_id, "Listed {} events", events.len());
        Ok(events)
    }

    async fn batch_execute(
        &self,
        calendar_id: &str,
        requests: &[SubRequest],
    ) -> Result<Vec<SubResponse>, ServiceError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let token = self.auth.access_token().await?;
        let boundary = new_boundary();
        let body = encode(&boundary, calendar_id, requests)?;
        debug!(requests = requests.len(), "Sending batch:\n{}", body);

        let response = self
            .http
            .post(BATCH_URL)
            .bearer_auth(&token)
            .header(CONTENT_TYPE, format!("multipart/mixed; boundary={boundary}"))
            .body(body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await.map_err(transport)?;

        if !status.is_success() {
            return Err(ServiceError::Http {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let response_boundary = content_type
            .as_deref()
            .and_then(boundary_from_content_type)
            .ok_or_else(|| ServiceError::Decode("batch response has no multipart boundary".into()))?;

        Ok(decode(&text, &response_boundary, requests))
    }
}
