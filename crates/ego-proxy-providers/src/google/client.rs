//! Google Calendar API client.
//!
//! A thin HTTP layer over Calendar API v3: request building, status
//! mapping and conversion of API events into [`CalendarEvent`]s.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use ego_proxy_core::{CalendarEvent, EventTime, NewEvent, TimeWindow};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};

/// Largest page Google accepts for events.list.
const MAX_PAGE_SIZE: usize = 2500;

/// Google Calendar API client.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    api_base: String,
    access_token: String,
}

impl GoogleCalendarClient {
    pub fn new(
        access_token: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                ProviderError::internal(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            http_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    /// Updates the access token (after refresh).
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(calendar_id)
        )
    }

    /// Creates an event and returns it as stored by Google.
    pub async fn insert_event(
        &self,
        calendar_id: &str,
        event: &NewEvent,
    ) -> ProviderResult<CalendarEvent> {
        let body = event_body(event);
        debug!("inserting event '{}' into {}", event.summary, calendar_id);

        let request = self
            .http_client
            .post(self.events_url(calendar_id))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string());
        let body = self.send(request).await?;

        let created: ApiEvent = parse_body(&body)?;
        convert_event(created, calendar_id)
            .ok_or_else(|| ProviderError::invalid_response("created event is missing id or times"))
    }

    /// Lists events whose time range overlaps `window`, recurring events
    /// expanded into instances, ordered by start time.
    pub async fn list_events(
        &self,
        calendar_id: &str,
        window: &TimeWindow,
        max_results: Option<usize>,
    ) -> ProviderResult<Vec<CalendarEvent>> {
        let mut all_events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_events_page(
                    calendar_id,
                    window.start,
                    window.end,
                    max_results,
                    page_token.as_deref(),
                )
                .await?;

            all_events.extend(
                page.items
                    .into_iter()
                    .filter_map(|event| convert_event(event, calendar_id)),
            );

            if let Some(max) = max_results
                && all_events.len() >= max
            {
                all_events.truncate(max);
                break;
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(
            "fetched {} events from calendar {}",
            all_events.len(),
            calendar_id
        );
        Ok(all_events)
    }

    async fn list_events_page(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        max_results: Option<usize>,
        page_token: Option<&str>,
    ) -> ProviderResult<EventListResponse> {
        let mut request = self.http_client.get(self.events_url(calendar_id)).query(&[
            ("timeMin", time_min.to_rfc3339()),
            ("timeMax", time_max.to_rfc3339()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ]);

        if let Some(max) = max_results {
            request = request.query(&[("maxResults", max.min(MAX_PAGE_SIZE).to_string())]);
        }

        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let body = self.send(request).await?;
        parse_body(&body)
    }

    /// Deletes an event. Already deleted events are reported as not found.
    pub async fn delete_event(&self, calendar_id: &str, event_id: &str) -> ProviderResult<()> {
        let url = format!(
            "{}/{}",
            self.events_url(calendar_id),
            urlencoding::encode(event_id)
        );

        match self.send(self.http_client.delete(url)).await {
            Ok(_) => {
                debug!("deleted event {} from {}", event_id, calendar_id);
                Ok(())
            }
            Err(e) if e.code() == crate::error::ProviderErrorCode::NotFound => Err(
                ProviderError::not_found(format!("event not found: {}", event_id)),
            ),
            Err(e) => Err(e),
        }
    }

    /// Lists the calendars on the user's calendar list.
    pub async fn list_calendars(&self) -> ProviderResult<Vec<CalendarListEntry>> {
        let url = format!("{}/users/me/calendarList", self.api_base);
        let body = self.send(self.http_client.get(url)).await?;
        let list: CalendarListResponse = parse_body(&body)?;
        Ok(list.items)
    }

    /// Sends an authorized request and returns the body of a 2xx response.
    async fn send(&self, request: reqwest::RequestBuilder) -> ProviderResult<String> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    "request timeout".to_string()
                } else if e.is_connect() {
                    format!("connection failed: {}", e)
                } else {
                    format!("request failed: {}", e)
                };
                ProviderError::network(message).with_source(e)
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());

        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read response: {}", e)).with_source(e)
        })?;

        if status.is_success() {
            return Ok(body);
        }

        Err(status_error(status, retry_after, &body))
    }
}

/// Maps a non-success status to a classified error.
fn status_error(status: StatusCode, retry_after: Option<u64>, body: &str) -> ProviderError {
    let detail = api_error_message(body);

    match status {
        StatusCode::UNAUTHORIZED => ProviderError::authentication(format!(
            "access token expired or invalid: {}",
            detail
        )),
        StatusCode::FORBIDDEN => {
            ProviderError::authorization(format!("access denied to calendar: {}", detail))
        }
        StatusCode::NOT_FOUND | StatusCode::GONE => ProviderError::not_found(detail),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(format!(
            "rate limit exceeded{}",
            retry_after
                .map(|s| format!(", retry after {} seconds", s))
                .unwrap_or_default()
        )),
        StatusCode::BAD_REQUEST => ProviderError::bad_request(detail),
        s if s.is_server_error() => ProviderError::server(format!("API error ({}): {}", s, detail)),
        s => ProviderError::calendar(format!("API error ({}): {}", s, detail)),
    }
}

/// Pulls `error.message` out of a Google error body, falling back to the
/// raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &str) -> ProviderResult<T> {
    serde_json::from_str(body).map_err(|e| {
        ProviderError::invalid_response(format!("failed to parse response: {}", e))
    })
}

fn event_body(event: &NewEvent) -> serde_json::Value {
    let time = |dt: &DateTime<chrono::FixedOffset>| match &event.time_zone {
        Some(tz) => json!({ "dateTime": dt.to_rfc3339(), "timeZone": tz }),
        None => json!({ "dateTime": dt.to_rfc3339() }),
    };

    let mut body = json!({
        "summary": event.summary,
        "start": time(&event.start),
        "end": time(&event.end),
    });
    if let Some(description) = &event.description {
        body["description"] = json!(description);
    }
    body
}

/// Converts an API event. Cancelled events and events without an id or
/// usable times are skipped.
fn convert_event(event: ApiEvent, calendar_id: &str) -> Option<CalendarEvent> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }

    let id = event.id?;
    let start = convert_time(&event.start, &id, "start")?;
    let end = convert_time(&event.end, &id, "end")?;
    let summary = event
        .summary
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "(No title)".to_string());

    let mut converted = CalendarEvent::new(id, summary, start, end, calendar_id);
    converted.description = event.description;
    converted.location = event.location;
    converted.html_link = event.html_link;
    Some(converted)
}

fn convert_time(time: &ApiEventTime, id: &str, which: &str) -> Option<EventTime> {
    match (&time.date_time, &time.date) {
        (Some(dt), _) => DateTime::parse_from_rfc3339(dt)
            .map(EventTime::from_local)
            .map_err(|e| warn!("failed to parse {} time of event {}: {}", which, id, e))
            .ok(),
        (None, Some(date)) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(EventTime::from_date)
            .map_err(|e| warn!("failed to parse {} date of event {}: {}", which, id, e))
            .ok(),
        (None, None) => {
            warn!("event {} has no {} time", id, which);
            None
        }
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

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    #[serde(default)]
    start: ApiEventTime,
    #[serde(default)]
    end: ApiEventTime,
    html_link: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date: Option<String>,
    date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
}

/// A calendar from the calendar list.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListEntry {
    pub id: String,
    /// The calendar name.
    pub summary: String,
    pub description: Option<String>,
    #[serde(default)]
    pub primary: bool,
    pub time_zone: Option<String>,
    /// `owner`, `writer`, `reader` or `freeBusyReader`.
    pub access_role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use crate::testing::{MockResponse, MockServer};
    use chrono::{FixedOffset, TimeZone};

    fn client(server: &MockServer) -> GoogleCalendarClient {
        GoogleCalendarClient::new("test-token", server.url(), Duration::from_secs(5), "test")
            .unwrap()
    }

    fn window() -> TimeWindow {
        let start = Utc.with_ymd_and_hms(2025, 3, 12, 0, 0, 0).unwrap();
        TimeWindow::days_ahead(start, 7)
    }

    #[test]
    fn convert_timed_and_all_day_events() {
        let json = r#"{
            "id": "event1",
            "start": {"dateTime": "2025-03-15T10:00:00-05:00"},
            "end": {"dateTime": "2025-03-15T11:00:00-05:00"},
            "htmlLink": "https://calendar.google.com/event?eid=1"
        }"#;
        let event = convert_event(serde_json::from_str(json).unwrap(), "primary").unwrap();
        assert_eq!(event.summary, "(No title)");
        assert_eq!(
            event.start,
            EventTime::DateTime(Utc.with_ymd_and_hms(2025, 3, 15, 15, 0, 0).unwrap())
        );
        assert_eq!(event.duration_minutes(), 60);
        assert_eq!(event.calendar_id, "primary");

        let json = r#"{
            "id": "event2",
            "summary": "Holiday",
            "start": {"date": "2025-03-17"},
            "end": {"date": "2025-03-18"}
        }"#;
        let event = convert_event(serde_json::from_str(json).unwrap(), "primary").unwrap();
        assert!(event.is_all_day());
    }

    #[test]
    fn convert_skips_unusable_events() {
        let cancelled = r#"{"id": "x", "status": "cancelled", "start": {}, "end": {}}"#;
        assert!(convert_event(serde_json::from_str(cancelled).unwrap(), "primary").is_none());

        let no_start = r#"{"id": "x", "end": {"date": "2025-03-18"}}"#;
        assert!(convert_event(serde_json::from_str(no_start).unwrap(), "primary").is_none());

        let bad_time = r#"{"id": "x", "start": {"dateTime": "soon"}, "end": {"dateTime": "later"}}"#;
        assert!(convert_event(serde_json::from_str(bad_time).unwrap(), "primary").is_none());
    }

    #[test]
    fn event_body_includes_time_zone() {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let event = NewEvent {
            summary: "Dentist".to_string(),
            start: offset.with_ymd_and_hms(2025, 3, 13, 15, 0, 0).unwrap(),
            end: offset.with_ymd_and_hms(2025, 3, 13, 16, 0, 0).unwrap(),
            description: None,
            time_zone: None,
        };

        assert_eq!(
            event_body(&event),
            json!({
                "summary": "Dentist",
                "start": {"dateTime": "2025-03-13T15:00:00-05:00"},
                "end": {"dateTime": "2025-03-13T16:00:00-05:00"},
            })
        );

        let body = event_body(&event.with_time_zone("America/New_York"));
        assert_eq!(body["start"]["timeZone"], "America/New_York");
        assert!(body.get("description").is_none());
    }

    #[test]
    fn status_mapping() {
        let body = r#"{"error": {"code": 404, "message": "Not Found"}}"#;
        let err = status_error(StatusCode::NOT_FOUND, None, body);
        assert_eq!(err.code(), ProviderErrorCode::NotFound);
        assert_eq!(err.message(), "Not Found");

        let cases = [
            (StatusCode::UNAUTHORIZED, ProviderErrorCode::AuthenticationFailed),
            (StatusCode::FORBIDDEN, ProviderErrorCode::AuthorizationFailed),
            (StatusCode::GONE, ProviderErrorCode::NotFound),
            (StatusCode::TOO_MANY_REQUESTS, ProviderErrorCode::RateLimited),
            (StatusCode::BAD_REQUEST, ProviderErrorCode::BadRequest),
            (StatusCode::BAD_GATEWAY, ProviderErrorCode::ServerError),
            (StatusCode::CONFLICT, ProviderErrorCode::CalendarError),
        ];
        for (status, code) in cases {
            assert_eq!(status_error(status, None, "").code(), code, "{}", status);
        }

        let err = status_error(StatusCode::TOO_MANY_REQUESTS, Some(30), "");
        assert_eq!(err.message(), "rate limit exceeded, retry after 30 seconds");
    }

    #[tokio::test]
    async fn list_events_follows_pages() {
        let server = MockServer::start(vec![
            MockResponse::json(
                200,
                r#"{"items": [
                    {"id": "a", "summary": "First", "start": {"dateTime": "2025-03-12T10:00:00Z"}, "end": {"dateTime": "2025-03-12T11:00:00Z"}},
                    {"id": "gone", "status": "cancelled", "start": {}, "end": {}}
                ], "nextPageToken": "page-2"}"#,
            ),
            MockResponse::json(
                200,
                r#"{"items": [
                    {"id": "b", "summary": "Second", "start": {"dateTime": "2025-03-13T10:00:00Z"}, "end": {"dateTime": "2025-03-13T11:00:00Z"}}
                ]}"#,
            ),
        ])
        .await;

        let events = client(&server)
            .list_events("primary", &window(), None)
            .await
            .unwrap();
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].target.starts_with("/calendars/primary/events?"));
        assert!(requests[0].target.contains("singleEvents=true"));
        assert!(requests[0].target.contains("orderBy=startTime"));
        assert!(requests[1].target.contains("pageToken=page-2"));
        assert_eq!(requests[0].header("authorization"), Some("Bearer test-token"));
    }

    #[tokio::test]
    async fn list_events_stops_at_max_results() {
        let server = MockServer::start(vec![MockResponse::json(
            200,
            r#"{"items": [
                {"id": "a", "start": {"date": "2025-03-12"}, "end": {"date": "2025-03-13"}},
                {"id": "b", "start": {"date": "2025-03-13"}, "end": {"date": "2025-03-14"}}
            ], "nextPageToken": "more"}"#,
        )])
        .await;

        let events = client(&server)
            .list_events("primary", &window(), Some(1))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(server.requests().len(), 1);
        assert!(server.requests()[0].target.contains("maxResults=1"));
    }

    #[tokio::test]
    async fn insert_event_posts_json() {
        let server = MockServer::start(vec![MockResponse::json(
            200,
            r#"{"id": "new-id", "summary": "Dentist", "status": "confirmed",
                "htmlLink": "https://calendar.google.com/event?eid=new",
                "start": {"dateTime": "2025-03-13T15:00:00Z"},
                "end": {"dateTime": "2025-03-13T16:00:00Z"}}"#,
        )])
        .await;

        let start = Utc.with_ymd_and_hms(2025, 3, 13, 15, 0, 0).unwrap().fixed_offset();
        let event = NewEvent {
            summary: "Dentist".to_string(),
            start,
            end: start + chrono::Duration::hours(1),
            description: Some("Created from: add meeting".to_string()),
            time_zone: None,
        };

        let created = client(&server)
            .insert_event("team@example.com", &event)
            .await
            .unwrap();
        assert_eq!(created.id, "new-id");
        assert_eq!(
            created.html_link.as_deref(),
            Some("https://calendar.google.com/event?eid=new")
        );

        let request = &server.requests()[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.target, "/calendars/team%40example.com/events");
        assert_eq!(request.header("content-type"), Some("application/json"));
        let sent: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(sent["summary"], "Dentist");
        assert_eq!(sent["description"], "Created from: add meeting");
    }

    #[tokio::test]
    async fn delete_event_statuses() {
        let server = MockServer::start(vec![
            MockResponse::empty(204),
            MockResponse::json(410, r#"{"error": {"code": 410, "message": "Resource has been deleted"}}"#),
        ])
        .await;
        let client = client(&server);

        client.delete_event("primary", "evt1").await.unwrap();
        let err = client.delete_event("primary", "evt1").await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::NotFound);
        assert_eq!(err.message(), "event not found: evt1");

        let requests = server.requests();
        assert_eq!(requests[0].method, "DELETE");
        assert_eq!(requests[0].target, "/calendars/primary/events/evt1");
    }

    #[tokio::test]
    async fn unauthorized_and_rate_limited() {
        let server = MockServer::start(vec![
            MockResponse::json(401, r#"{"error": {"code": 401, "message": "Invalid Credentials"}}"#),
            MockResponse::empty(429).with_header("Retry-After", "12"),
        ])
        .await;
        let client = client(&server);

        let err = client.list_calendars().await.unwrap_err();
        assert!(err.is_authentication());
        assert!(err.message().contains("Invalid Credentials"));

        let err = client.list_calendars().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::RateLimited);
        assert!(err.is_retryable());
        assert!(err.message().contains("retry after 12 seconds"));
    }

    #[tokio::test]
    async fn list_calendars_parses_entries() {
        let server = MockServer::start(vec![MockResponse::json(
            200,
            r#"{"items": [
                {"id": "me@example.com", "summary": "Me", "primary": true,
                 "timeZone": "Europe/Paris", "accessRole": "owner"},
                {"id": "holidays", "summary": "Holidays", "accessRole": "reader"}
            ]}"#,
        )])
        .await;

        let calendars = client(&server).list_calendars().await.unwrap();
        assert_eq!(calendars.len(), 2);
        assert!(calendars[0].primary);
        assert_eq!(calendars[0].access_role.as_deref(), Some("owner"));
        assert!(!calendars[1].primary);
        assert_eq!(server.requests()[0].target, "/users/me/calendarList");
    }
}
