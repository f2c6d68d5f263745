//! Time types for calendar events.
//!
//! [`EventTime`] is the start or end of an event as returned by a calendar
//! (a specific instant or an all-day date), and [`TimeWindow`] is a query
//! range for listing events.

use chrono::{DateTime, Duration, NaiveDate, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The start or end of a calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific instant, stored in UTC.
    DateTime(DateTime<Utc>),
    /// An all-day date.
    AllDay(NaiveDate),
}

impl EventTime {
    /// Creates an `EventTime::DateTime` from a datetime in any timezone.
    pub fn from_local<Tz: TimeZone>(dt: DateTime<Tz>) -> Self {
        Self::DateTime(dt.with_timezone(&Utc))
    }

    /// Creates an `EventTime::AllDay`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::AllDay(date)
    }

    /// Returns `true` for all-day times.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Converts to a UTC instant for ordering. All-day dates map to
    /// midnight UTC.
    pub fn to_utc_datetime(&self) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::AllDay(date) => date.and_time(chrono::NaiveTime::MIN).and_utc(),
        }
    }

    /// Renders the time in the given timezone for terminal output.
    ///
    /// `Mon Mar 15 14:00` for instants, `Mon Mar 15 (all day)` for dates.
    pub fn display_in<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        match self {
            Self::DateTime(dt) => dt.with_timezone(tz).format("%a %b %-d %H:%M").to_string(),
            Self::AllDay(date) => format!("{} (all day)", date.format("%a %b %-d")),
        }
    }
}

impl PartialOrd for EventTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_utc_datetime().cmp(&other.to_utc_datetime())
    }
}

/// A half-open `[start, end)` interval in UTC used for event queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// # Panics
    ///
    /// Panics if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(start <= end, "TimeWindow start must be <= end");
        Self { start, end }
    }

    /// A window starting at `now` and covering the next `days` days.
    ///
    /// The end saturates at the latest representable instant.
    pub fn days_ahead(now: DateTime<Utc>, days: u32) -> Self {
        let end = TimeDelta::try_days(i64::from(days))
            .and_then(|span| now.checked_add_signed(span))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::new(now, end)
    }

    /// Returns the length of the window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn from_local_converts_to_utc() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let local = tz.with_ymd_and_hms(2025, 3, 15, 14, 0, 0).unwrap();
        assert_eq!(
            EventTime::from_local(local),
            EventTime::DateTime(utc(2025, 3, 15, 12, 0))
        );
    }

    #[test]
    fn ordering_puts_all_day_at_midnight() {
        let morning = EventTime::DateTime(utc(2025, 3, 15, 9, 0));
        let all_day = EventTime::from_date(date(2025, 3, 15));
        let next_day = EventTime::from_date(date(2025, 3, 16));

        assert!(all_day < morning);
        assert!(morning < next_day);
        assert!(all_day.is_all_day());
    }

    #[test]
    fn display_formats() {
        let et = EventTime::DateTime(utc(2025, 3, 15, 14, 5));
        assert_eq!(et.display_in(&Utc), "Sat Mar 15 14:05");

        let et = EventTime::from_date(date(2025, 3, 17));
        assert_eq!(et.display_in(&Utc), "Mon Mar 17 (all day)");
    }

    #[test]
    fn window_days_ahead() {
        let now = utc(2025, 3, 15, 10, 0);
        let window = TimeWindow::days_ahead(now, 7);
        assert_eq!(window.start, now);
        assert_eq!(window.end, utc(2025, 3, 22, 10, 0));
        assert_eq!(window.duration(), Duration::days(7));
    }

    #[test]
    fn window_end_saturates() {
        let now = utc(2025, 3, 15, 10, 0);
        let window = TimeWindow::days_ahead(now, u32::MAX);
        assert_eq!(window.start, now);
        assert_eq!(window.end, DateTime::<Utc>::MAX_UTC);

        let window = TimeWindow::days_ahead(DateTime::<Utc>::MAX_UTC, 1);
        assert_eq!(window.duration(), Duration::zero());
    }

    #[test]
    #[should_panic(expected = "start must be <= end")]
    fn invalid_window() {
        TimeWindow::new(utc(2025, 3, 15, 10, 0), utc(2025, 3, 15, 9, 0));
    }

    #[test]
    fn serde_roundtrip() {
        let et = EventTime::from_date(date(2025, 3, 15));
        let json = serde_json::to_string(&et).unwrap();
        assert_eq!(json, r#"{"type":"AllDay","value":"2025-03-15"}"#);
        let parsed: EventTime = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, et);
    }
}
