//! Google Calendar API client.
//!
//! A thin HTTP client for the events.list endpoint. The access token is
//! passed per call so the token lifecycle layer can retry a request with a
//! freshly refreshed token.

use std::time::Duration;

use chrono::DateTime;
use serde::Deserialize;
use tracing::{debug, warn};

use meetsync_core::time::TimeWindow;

use crate::error::{ProviderError, ProviderResult};
use crate::raw_event::{RawEvent, RawEventTime};

/// Base URL for Google Calendar API v3.
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Google Calendar API client.
#[derive(Debug)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
}

impl GoogleCalendarClient {
    /// Creates a new client with the given request timeout.
    pub fn new(timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ProviderError::internal(format!("failed to create HTTP client: {e}"))
                    .with_provider("google")
            })?;

        Ok(Self { http_client })
    }

    /// Lists events from a calendar within the given window.
    ///
    /// Recurring events are expanded server-side (`singleEvents=true`);
    /// pagination is followed until exhausted.
    pub async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        window: &TimeWindow,
    ) -> ProviderResult<Vec<RawEvent>> {
        let mut all_events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_events_page(access_token, calendar_id, window, page_token.as_deref())
                .await?;

            for event in page.items {
                if let Some(raw) = convert_event(event) {
                    all_events.push(raw);
                }
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(
            count = all_events.len(),
            calendar = %calendar_id,
            "fetched google events"
        );
        Ok(all_events)
    }

    /// Fetches a single page of events.
    async fn list_events_page(
        &self,
        access_token: &str,
        calendar_id: &str,
        window: &TimeWindow,
        page_token: Option<&str>,
    ) -> ProviderResult<EventListResponse> {
        let url = format!(
            "{}/calendars/{}/events",
            CALENDAR_API_BASE,
            urlencoding::encode(calendar_id)
        );

        let mut request = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("timeMin", window.start.to_rfc3339()),
                ("timeMax", window.end.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ]);

        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request.send().await.map_err(|e| {
            let err = if e.is_timeout() {
                ProviderError::unreachable("request timeout")
            } else if e.is_connect() {
                ProviderError::unreachable(format!("connection failed: {e}"))
            } else {
                ProviderError::unreachable(format!("request failed: {e}"))
            };
            err.with_provider("google")
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return Err(ProviderError::rate_limited(format!(
                "rate limit exceeded{}",
                retry_after
                    .map(|s| format!(", retry after {s} seconds"))
                    .unwrap_or_default()
            ))
            .with_provider("google"));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(
                ProviderError::unauthorized("access token expired or invalid")
                    .with_provider("google"),
            );
        }

        if status == reqwest::StatusCode::FORBIDDEN {
            // Google reports quota exhaustion as 403 with a rate-limit reason
            let body = response.text().await.unwrap_or_default();
            let err = if body.contains("ateLimitExceeded") || body.contains("quotaExceeded") {
                ProviderError::rate_limited("calendar API quota exceeded")
            } else {
                ProviderError::unauthorized("access denied to calendar")
            };
            return Err(err.with_provider("google"));
        }

        if status.is_server_error() {
            return Err(
                ProviderError::unreachable(format!("calendar API error ({status})"))
                    .with_provider("google"),
            );
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(
                ProviderError::malformed(format!("unexpected status {status}: {body}"))
                    .with_provider("google"),
            );
        }

        let body = response.text().await.map_err(|e| {
            ProviderError::unreachable(format!("failed to read response: {e}"))
                .with_provider("google")
        })?;

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::malformed(format!("failed to parse events response: {e}"))
                .with_provider("google")
        })
    }
}

/// Converts a Google Calendar API event to a `RawEvent`.
///
/// All-day events are detected by the `date` vs `dateTime` field on the
/// boundary. Events without an id or usable start are skipped.
fn convert_event(event: ApiEvent) -> Option<RawEvent> {
    let id = event.id?;

    let start = match event.start.as_ref().and_then(convert_api_time) {
        Some(start) => start,
        None => {
            warn!(event_id = %id, "google event has no usable start");
            return None;
        }
    };
    let end = event.end.as_ref().and_then(convert_api_time);

    let mut raw = RawEvent::new(id, start);
    if let Some(end) = end {
        raw = raw.with_end(end);
    }
    if let Some(summary) = event.summary {
        raw = raw.with_summary(summary);
    }
    if let Some(status) = event.status {
        raw = raw.with_status(status);
    }
    Some(raw)
}

fn convert_api_time(t: &ApiEventTime) -> Option<RawEventTime> {
    match (&t.date_time, &t.date) {
        (Some(dt), _) => {
            let parsed = DateTime::parse_from_rfc3339(dt)
                .map_err(|e| warn!(error = %e, "failed to parse event datetime"))
                .ok()?;
            Some(RawEventTime::DateTime(parsed.with_timezone(&chrono::Utc)))
        }
        (None, Some(date)) => {
            let parsed = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| warn!(error = %e, "failed to parse event date"))
                .ok()?;
            Some(RawEventTime::Date(parsed))
        }
        (None, None) => None,
    }
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
}

/// A single event from the Google Calendar API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    summary: Option<String>,
    start: Option<ApiEventTime>,
    end: Option<ApiEventTime>,
    status: Option<String>,
}

/// Event time from the API: `dateTime` for timed, `date` for all-day.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date: Option<String>,
    date_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn parse_event_list_response() {
        let json = r#"{
            "items": [
                {
                    "id": "event1",
                    "summary": "Test Meeting",
                    "start": { "dateTime": "2026-03-15T10:00:00Z" },
                    "end": { "dateTime": "2026-03-15T11:00:00Z" },
                    "status": "confirmed"
                }
            ]
        }"#;

        let response: EventListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.items.len(), 1);
        assert!(response.next_page_token.is_none());
    }

    #[test]
    fn timed_event_conversion() {
        let json = r#"{
            "id": "event1",
            "summary": "Test Meeting",
            "start": { "dateTime": "2026-03-15T10:00:00+02:00" },
            "end": { "dateTime": "2026-03-15T11:00:00+02:00" }
        }"#;
        let event: ApiEvent = serde_json::from_str(json).unwrap();
        let raw = convert_event(event).unwrap();

        // Offsets are normalized to UTC
        assert_eq!(
            raw.start,
            RawEventTime::DateTime(Utc.with_ymd_and_hms(2026, 3, 15, 8, 0, 0).unwrap())
        );
        assert!(!raw.is_all_day());
    }

    #[test]
    fn all_day_detected_via_date_field() {
        let json = r#"{
            "id": "event1",
            "summary": "All Day Event",
            "start": { "date": "2026-03-15" },
            "end": { "date": "2026-03-16" }
        }"#;
        let event: ApiEvent = serde_json::from_str(json).unwrap();
        let raw = convert_event(event).unwrap();

        assert!(raw.is_all_day());
        assert_eq!(
            raw.start,
            RawEventTime::Date(NaiveDate::from_ymd_opt(2026, 3, 15).unwrap())
        );
        assert_eq!(
            raw.end,
            Some(RawEventTime::Date(
                NaiveDate::from_ymd_opt(2026, 3, 16).unwrap()
            ))
        );
    }

    #[test]
    fn event_without_start_is_skipped() {
        let json = r#"{ "id": "event1", "status": "cancelled" }"#;
        let event: ApiEvent = serde_json::from_str(json).unwrap();
        assert!(convert_event(event).is_none());
    }

    #[test]
    fn cancelled_status_is_carried_through() {
        let json = r#"{
            "id": "event1",
            "start": { "dateTime": "2026-03-15T10:00:00Z" },
            "end": { "dateTime": "2026-03-15T11:00:00Z" },
            "status": "cancelled"
        }"#;
        let event: ApiEvent = serde_json::from_str(json).unwrap();
        let raw = convert_event(event).unwrap();
        assert!(raw.is_cancelled());
    }
}
