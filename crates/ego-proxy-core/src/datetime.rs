//! Natural-language date and time resolution.
//!
//! Turns phrases such as `tomorrow at 3pm`, `next friday 10:30`,
//! `in 2 hours` or `march 15th at noon` into a concrete datetime relative
//! to a caller-supplied `now`. The grammar is intentionally small:
//!
//! - relative days: `today`, `tonight`, `tomorrow`, `day after tomorrow`,
//!   `next week`
//! - weekdays: `next friday` (strictly after today), `friday`, `on friday`,
//!   `this friday` (today included)
//! - offsets: `in 30 minutes`, `in an hour`, `in 3 days`
//! - absolute dates: `2025-03-15`, `3/15`, `3/15/2025`, `march 15`,
//!   `15th of march 2026`
//! - times: `3pm`, `3:30 pm`, `15:30`, `at 9`, `noon`, `midnight`,
//!   `morning`, `afternoon`, `evening`
//!
//! Dates without a time default to 09:00, except `today` (keeps the current
//! time) and `tonight` (20:00). A time without a date means today.

use std::sync::LazyLock;

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta,
    TimeZone, Timelike, Weekday,
};
use regex::{Captures, Regex};
use tracing::debug;

const WEEKDAYS: &str = "monday|tuesday|wednesday|thursday|friday|saturday|sunday";
const MONTHS: &str = "jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|\
                      aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

static DAY_AFTER_TOMORROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bday after tomorrow\b").expect("Invalid regex"));
static TOMORROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\btomorrow\b").expect("Invalid regex"));
static TODAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\btoday\b").expect("Invalid regex"));
static TONIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\btonight\b").expect("Invalid regex"));
static NEXT_WEEK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bnext week\b").expect("Invalid regex"));
static NEXT_WEEKDAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\bnext ({WEEKDAYS})\b")).expect("Invalid next-weekday regex")
});
static WEEKDAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?:(?:this|on) )?({WEEKDAYS})\b")).expect("Invalid weekday regex")
});
static OFFSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bin (\d+|an?|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve) (minutes?|mins?|hours?|hrs?|days?|weeks?)\b",
    )
    .expect("Invalid offset regex")
});
static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})(?:t|\b)").expect("Invalid ISO date regex")
});
static SLASH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{2}|\d{4}))?\b").expect("Invalid slash date regex")
});
static MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b({MONTHS}) (\d{{1,2}})(?:st|nd|rd|th)?(?: (\d{{4}}))?\b"
    ))
    .expect("Invalid month-day regex")
});
static DAY_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(\d{{1,2}})(?:st|nd|rd|th)? (?:of )?({MONTHS})(?: (\d{{4}}))?\b"
    ))
    .expect("Invalid day-month regex")
});
static MERIDIEM_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})(?::(\d{2}))? ?(am|pm)\b").expect("Invalid meridiem regex")
});
static CLOCK_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2}):(\d{2})\b").expect("Invalid clock regex"));
static BARE_HOUR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\bat )(\d{1,2})$|\bat (\d{1,2})\b").expect("Invalid regex"));
static NAMED_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(noon|midday|midnight|morning|afternoon|evening)\b")
        .expect("Invalid named time regex")
});

/// Time used when a phrase names a day but no time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefaultTime {
    At(NaiveTime),
    /// Keep the current wall-clock time.
    Now,
}

/// Outcome of looking for a time component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeMatch {
    Absent,
    At(NaiveTime),
    /// Something time-shaped was present but out of range (`25:00`, `13pm`).
    Invalid,
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Resolves a natural-language date/time phrase relative to `now`.
///
/// The result is in the same timezone as `now`, with seconds cleared.
/// Returns `None` for empty or unrecognised input and for out-of-range
/// values such as `25:00` or `february 30`.
pub fn parse_natural_datetime<Tz: TimeZone>(text: &str, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let text = normalize(text);
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = OFFSET.captures(&text) {
        let amount = word_number(&caps[1])?;
        let unit = &caps[2];
        let offset = if unit.starts_with("min") {
            TimeDelta::try_minutes(amount)
        } else if unit.starts_with('h') {
            TimeDelta::try_hours(amount)
        } else if unit.starts_with('d') {
            TimeDelta::try_days(amount)
        } else {
            TimeDelta::try_weeks(amount)
        }?;
        let target = now.clone().checked_add_signed(offset)?;
        return target.with_second(0).and_then(|dt| dt.with_nanosecond(0));
    }

    let today = now.date_naive();
    let (date, default_time, rest) = match find_date(&text, today) {
        DateMatch::Found {
            date,
            default_time,
            rest,
        } => (Some(date), default_time, rest),
        DateMatch::Invalid => {
            debug!("date in '{}' is out of range", text);
            return None;
        }
        DateMatch::Absent => (None, DefaultTime::At(hm(9, 0)), text.clone()),
    };

    let time = match find_time(&rest) {
        TimeMatch::Invalid => {
            debug!("time in '{}' is out of range", text);
            return None;
        }
        TimeMatch::At(time) => Some(time),
        TimeMatch::Absent => None,
    };

    let (date, time) = match (date, time) {
        (None, None) => {
            debug!("no date or time recognised in '{}'", text);
            return None;
        }
        (None, Some(time)) => (today, time),
        (Some(date), Some(time)) => (date, time),
        (Some(date), None) => match default_time {
            DefaultTime::At(time) => (date, time),
            DefaultTime::Now => (date, hm(now.hour(), now.minute())),
        },
    };

    resolve_local(&now.timezone(), date.and_time(time))
}

fn normalize(text: &str) -> String {
    let lowered = text
        .to_lowercase()
        .replace("a.m.", "am")
        .replace("p.m.", "pm")
        .replace([',', '@'], " ");
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn word_number(word: &str) -> Option<i64> {
    let value = match word {
        "a" | "an" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        digits => digits.parse().ok()?,
    };
    Some(value)
}

enum DateMatch {
    Absent,
    Invalid,
    Found {
        date: NaiveDate,
        default_time: DefaultTime,
        rest: String,
    },
}

fn strip(text: &str, caps: &Captures<'_>) -> String {
    let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
    format!("{} {}", &text[..whole.start], &text[whole.end..])
        .trim()
        .to_string()
}

fn found(date: Option<NaiveDate>, default_time: DefaultTime, rest: String) -> DateMatch {
    match date {
        Some(date) => DateMatch::Found {
            date,
            default_time,
            rest,
        },
        None => DateMatch::Invalid,
    }
}

fn find_date(text: &str, today: NaiveDate) -> DateMatch {
    let nine = DefaultTime::At(hm(9, 0));

    if let Some(caps) = DAY_AFTER_TOMORROW.captures(text) {
        return found(today.checked_add_signed(Duration::days(2)), nine, strip(text, &caps));
    }
    if let Some(caps) = TOMORROW.captures(text) {
        return found(today.succ_opt(), nine, strip(text, &caps));
    }
    if let Some(caps) = TODAY.captures(text) {
        return found(Some(today), DefaultTime::Now, strip(text, &caps));
    }
    if let Some(caps) = TONIGHT.captures(text) {
        return found(Some(today), DefaultTime::At(hm(20, 0)), strip(text, &caps));
    }
    if let Some(caps) = NEXT_WEEK.captures(text) {
        return found(today.checked_add_signed(Duration::days(7)), nine, strip(text, &caps));
    }
    if let Some(caps) = NEXT_WEEKDAY.captures(text) {
        let date = weekday(&caps[1]).map(|target| next_weekday(today, target, true));
        return found(date, nine, strip(text, &caps));
    }
    if let Some(caps) = WEEKDAY.captures(text) {
        let date = weekday(&caps[1]).map(|target| next_weekday(today, target, false));
        return found(date, nine, strip(text, &caps));
    }
    if let Some(caps) = ISO_DATE.captures(text) {
        let date = match (caps[1].parse(), caps[2].parse(), caps[3].parse()) {
            (Ok(y), Ok(m), Ok(d)) => NaiveDate::from_ymd_opt(y, m, d),
            _ => None,
        };
        return found(date, nine, strip(text, &caps));
    }
    if let Some(caps) = SLASH_DATE.captures(text) {
        let month = caps[1].parse().ok();
        let day = caps[2].parse().ok();
        let year = caps.get(3).and_then(|y| y.as_str().parse::<i32>().ok()).map(|y| {
            if y < 100 { 2000 + y } else { y }
        });
        let date = match (month, day) {
            (Some(m), Some(d)) => calendar_date(today, year, m, d),
            _ => None,
        };
        return found(date, nine, strip(text, &caps));
    }
    if let Some(caps) = MONTH_DAY.captures(text) {
        let date = month(&caps[1]).and_then(|m| {
            let day = caps[2].parse().ok()?;
            let year = caps.get(3).and_then(|y| y.as_str().parse().ok());
            calendar_date(today, year, m, day)
        });
        return found(date, nine, strip(text, &caps));
    }
    if let Some(caps) = DAY_MONTH.captures(text) {
        let date = month(&caps[2]).and_then(|m| {
            let day = caps[1].parse().ok()?;
            let year = caps.get(3).and_then(|y| y.as_str().parse().ok());
            calendar_date(today, year, m, day)
        });
        return found(date, nine, strip(text, &caps));
    }

    DateMatch::Absent
}

/// Builds a month/day date. Without an explicit year, a date that already
/// passed this year rolls over to next year.
fn calendar_date(today: NaiveDate, year: Option<i32>, month: u32, day: u32) -> Option<NaiveDate> {
    match year {
        Some(year) => NaiveDate::from_ymd_opt(year, month, day),
        None => {
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
            match this_year {
                Some(date) if date >= today => Some(date),
                _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
            }
        }
    }
}

fn weekday(name: &str) -> Option<Weekday> {
    name.parse().ok()
}

fn month(name: &str) -> Option<u32> {
    let month = match name.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Next occurrence of `target`. With `strict`, today never matches.
fn next_weekday(today: NaiveDate, target: Weekday, strict: bool) -> NaiveDate {
    let current = i64::from(today.weekday().num_days_from_monday());
    let wanted = i64::from(target.num_days_from_monday());
    let mut days_ahead = wanted - current;
    if days_ahead < 0 || (strict && days_ahead == 0) {
        days_ahead += 7;
    }
    today + Duration::days(days_ahead)
}

fn find_time(text: &str) -> TimeMatch {
    if let Some(caps) = MERIDIEM_TIME.captures(text) {
        let hour: u32 = caps[1].parse().unwrap_or(99);
        let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok()).unwrap_or(99);
        if !(1..=12).contains(&hour) || minute > 59 {
            return TimeMatch::Invalid;
        }
        let hour = match (&caps[3], hour) {
            ("am", 12) => 0,
            ("am", h) => h,
            ("pm", 12) => 12,
            (_, h) => h + 12,
        };
        return TimeMatch::At(hm(hour, minute));
    }

    if let Some(caps) = CLOCK_TIME.captures(text) {
        return clock(&caps[1], &caps[2]);
    }

    if let Some(caps) = BARE_HOUR.captures(text) {
        let hour = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        return clock(hour, "0");
    }

    if let Some(caps) = NAMED_TIME.captures(text) {
        let time = match &caps[1] {
            "noon" | "midday" => hm(12, 0),
            "midnight" => hm(0, 0),
            "morning" => hm(9, 0),
            "afternoon" => hm(15, 0),
            _ => hm(18, 0),
        };
        return TimeMatch::At(time);
    }

    TimeMatch::Absent
}

fn clock(hour: &str, minute: &str) -> TimeMatch {
    match (hour.parse::<u32>(), minute.parse::<u32>()) {
        (Ok(h), Ok(m)) if h <= 23 && m <= 59 => TimeMatch::At(hm(h, m)),
        _ => TimeMatch::Invalid,
    }
}

/// Maps a wall-clock time onto the timezone. Ambiguous times (DST fold)
/// take the earlier instant; non-existent times (DST gap) move forward one
/// hour.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest(),
    }
}
