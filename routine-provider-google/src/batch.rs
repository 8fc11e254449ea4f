//! `multipart/mixed` encoding for the Calendar batch endpoint.
//!
//! Every sub-request becomes one `application/http` part tagged
//! `Content-ID: <item-{id}>`; Google answers with parts tagged
//! `<response-item-{id}>`, each holding a complete HTTP response.

use std::collections::HashMap;

use routine_core::{ExistingEvent, OperationKind, ServiceError, SubRequest, SubResponse};
use url::Url;
use uuid::Uuid;

use crate::types::{GoogleEvent, error_message};

pub const API_BASE: &str = "https://www.googleapis.com/calendar/v3/";

pub fn new_boundary() -> String {
    format!("batch_{}", Uuid::new_v4().simple())
}

/// `.../calendars/{calendar_id}/events[/{event_id}]` with both ids escaped.
pub fn events_url(calendar_id: &str, event_id: Option<&str>) -> Result<Url, ServiceError> {
    let mut url = Url::parse(API_BASE).map_err(|e| ServiceError::Transport(e.to_string()))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| ServiceError::Transport(format!("{API_BASE} cannot be a base URL")))?;
        segments.pop_if_empty().extend(["calendars", calendar_id, "events"]);
        if let Some(id) = event_id {
            segments.push(id);
        }
    }
    Ok(url)
}

pub fn encode(boundary: &str, calendar_id: &str, requests: &[SubRequest]) -> Result<String, ServiceError> {
    let mut body = String::new();

    for request in requests {
        let (method, url, payload) = match &request.operation {
            OperationKind::Insert(event) => ("POST", events_url(calendar_id, None)?, Some(event)),
            OperationKind::Update(id, event) => ("PUT", events_url(calendar_id, Some(id))?, Some(event)),
            OperationKind::Delete(id) => ("DELETE", events_url(calendar_id, Some(id))?, None),
        };

        body.push_str(&format!("--{boundary}\r\n"));
        body.push_str("Content-Type: application/http\r\n");
        body.push_str(&format!("Content-ID: <item-{}>\r\n\r\n", request.request_id));
        body.push_str(&format!("{method} {} HTTP/1.1\r\n", url.path()));

        match payload {
            Some(event) => {
                let json = serde_json::to_string(&GoogleEvent::from(event))
                    .map_err(|e| ServiceError::Decode(e.to_string()))?;
                body.push_str("Content-Type: application/json\r\n\r\n");
                body.push_str(&json);
                body.push_str("\r\n");
            }
            None => body.push_str("\r\n"),
        }
    }

    body.push_str(&format!("--{boundary}--\r\n"));
    Ok(body)
}

/// The `boundary` parameter of a `multipart/mixed` content type.
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("boundary")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

/// Map a batch response back onto `requests`, in request order. Sub-requests
/// without a matching part get a `Decode` error.
pub fn decode(body: &str, boundary: &str, requests: &[SubRequest]) -> Vec<SubResponse> {
    let normalized = body.replace("\r\n", "\n");
    let delimiter = format!("--{boundary}");

    let mut by_id: HashMap<String, SubResponse> = normalized
        .split(delimiter.as_str())
        .skip(1)
        .take_while(|part| !part.starts_with("--"))
        .filter_map(parse_part)
        .collect();

    requests
        .iter()
        .map(|request| {
            by_id.remove(&request.request_id).unwrap_or_else(|| {
                Err(ServiceError::Decode(format!(
                    "no response for request {}",
                    request.request_id
                )))
            })
        })
        .collect()
}

fn parse_part(part: &str) -> Option<(String, SubResponse)> {
    let (headers, http) = part.trim_start_matches('\n').split_once("\n\n")?;

    let id = header_value(headers, "content-id")?
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim_start_matches("response-")
        .trim_start_matches("item-")
        .to_string();

    let (head, payload) = http.split_once("\n\n").unwrap_or((http, ""));
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse::<u16>().ok());

    let response = match status {
        Some(status) if (200..300).contains(&status) => decode_event(payload),
        Some(status) => Err(ServiceError::Http {
            status,
            message: error_message(payload),
        }),
        None => Err(ServiceError::Decode(format!("missing status line for request {id}"))),
    };

    Some((id, response))
}

fn header_value<'a>(headers: &'a str, name: &str) -> Option<&'a str> {
    headers.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

fn decode_event(payload: &str) -> Result<Option<ExistingEvent>, ServiceError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(None);
    }

    let event: GoogleEvent = serde_json::from_str(payload).map_err(|e| ServiceError::Decode(e.to_string()))?;
    Ok(event.into_existing())
}
