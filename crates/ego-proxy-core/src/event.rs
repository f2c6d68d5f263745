//! Event types for calendar events.
//!
//! - [`CalendarEvent`]: an event as read back from a calendar
//! - [`NewEvent`]: an event to be created, usually built from a
//!   [`CalendarIntent`]

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::intent::CalendarIntent;
use crate::time::EventTime;

/// A calendar event returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Provider-specific identifier, used for deletion.
    pub id: String,
    /// The event title. Untitled events get `(No title)`.
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    pub description: Option<String>,
    pub location: Option<String>,
    /// URL to view the event in the calendar web UI.
    pub html_link: Option<String>,
    /// The calendar this event belongs to.
    pub calendar_id: String,
}

impl CalendarEvent {
    /// Creates a new CalendarEvent with required fields.
    pub fn new(
        id: impl Into<String>,
        summary: impl Into<String>,
        start: EventTime,
        end: EventTime,
        calendar_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            start,
            end,
            description: None,
            location: None,
            html_link: None,
            calendar_id: calendar_id.into(),
        }
    }

    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }

    /// Returns the duration of the event in minutes.
    pub fn duration_minutes(&self) -> i64 {
        let duration = self.end.to_utc_datetime() - self.start.to_utc_datetime();
        duration.num_minutes()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_html_link(mut self, url: impl Into<String>) -> Self {
        self.html_link = Some(url.into());
        self
    }
}

/// An event to be inserted into a calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub summary: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub description: Option<String>,
    /// IANA time zone name sent alongside the start and end, if known.
    pub time_zone: Option<String>,
}

impl NewEvent {
    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = Some(time_zone.into());
        self
    }
}

impl From<&CalendarIntent> for NewEvent {
    fn from(intent: &CalendarIntent) -> Self {
        Self {
            summary: intent.summary.clone(),
            start: intent.start,
            end: intent.end(),
            description: intent.description.clone(),
            time_zone: None,
        }
    }
}
