//! Calendar intent detection.
//!
//! A message is a calendar request when it contains one of the
//! [`CALENDAR_TRIGGERS`]. The request is turned into an [`EventDraft`]
//! (by a language model when one is configured, otherwise by a heuristic
//! splitter) and the draft's date phrase is resolved with
//! [`parse_natural_datetime`].

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Duration, FixedOffset, TimeZone};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::datetime::parse_natural_datetime;
use crate::generator::{
    CALENDAR_SYSTEM_PROMPT, ChatMessage, GenerationOptions, TextGenerator, calendar_prompt,
};
use crate::metadata::parse_json_response;

/// Phrases that mark a message as a calendar request.
pub const CALENDAR_TRIGGERS: &[&str] = &[
    "add to my calendar",
    "add on my calendar",
    "add to my agenda",
    "add on my agenda",
    "add to calendar",
    "add on agenda",
    "schedule",
    "create event",
    "add event",
    "add a new event",
    "add an event",
    "new event",
    "put on my calendar",
    "put on calendar",
    "calendar event",
    "set up a meeting",
    "set up meeting",
    "book a meeting",
    "book meeting",
    "add appointment",
    "add a new appointment",
    "add an appointment",
    "create appointment",
    "new appointment",
    "add meeting",
    "add a meeting",
    "create meeting",
    "new meeting",
    "remind me",
];

const DEFAULT_DURATION_HOURS: f64 = 1.0;
const MAX_DURATION_HOURS: f64 = 24.0;

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bfor (\d+(?:\.\d+)?|an?|one|two|three|half an) (hours?|hrs?|minutes?|mins?)\b")
        .expect("Invalid duration regex")
});

/// First token that starts the "when" part of a request.
static TEMPORAL: LazyLock<Regex> = LazyLock::new(|| {
    const WEEKDAYS: &str = "monday|tuesday|wednesday|thursday|friday|saturday|sunday";
    const MONTHS: &str = "jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|\
                          aug(?:ust)?|sept?(?:ember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";
    let alternatives = [
        "day after tomorrow|tomorrow|today|tonight|next week".to_string(),
        format!("(?:on |this |next )?(?:{WEEKDAYS})"),
        r"in (?:\d+|an?|one|two|three|four|five|six|seven|eight|nine|ten) (?:minutes?|mins?|hours?|hrs?|days?|weeks?)".to_string(),
        r"(?:on )?\d{4}-\d{1,2}-\d{1,2}".to_string(),
        r"(?:on )?\d{1,2}/\d{1,2}".to_string(),
        format!(r"(?:on )?(?:{MONTHS}) \d{{1,2}}(?:st|nd|rd|th)?"),
        format!(r"(?:on )?\d{{1,2}}(?:st|nd|rd|th)? (?:of )?(?:{MONTHS})"),
        r"(?:at )?\d{1,2}(?::\d{2})? ?(?:am|pm)".to_string(),
        r"at \d{1,2}(?::\d{2})?".to_string(),
        "(?:at )?(?:noon|midnight)".to_string(),
    ];
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))
        .expect("Invalid temporal regex")
});

/// A calendar request as extracted from a message, before date resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub summary: String,
    /// The "when" phrase, e.g. `tomorrow at 3pm`.
    pub datetime_description: String,
    pub duration_hours: Option<f64>,
    pub description: Option<String>,
}

impl EventDraft {
    /// Reads a draft from model JSON. Requires a non-empty `summary`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let summary = text("summary")?;
        let duration_hours = match value.get("duration_hours") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };

        Some(Self {
            summary,
            datetime_description: text("datetime_description").unwrap_or_default(),
            duration_hours,
            description: text("description"),
        })
    }
}

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    CreateEvent,
}

/// A resolved calendar request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarIntent {
    pub kind: IntentKind,
    pub summary: String,
    /// Start in the offset of the `now` the request was resolved against.
    pub start: DateTime<FixedOffset>,
    pub duration: Duration,
    pub description: Option<String>,
}

impl CalendarIntent {
    pub fn end(&self) -> DateTime<FixedOffset> {
        self.start + self.duration
    }
}

/// Returns true if the message contains a calendar trigger phrase.
pub fn has_calendar_intent(message: &str) -> bool {
    find_trigger(&message.to_lowercase()).is_some()
}

/// Longest trigger contained in `lower`, with its byte offset.
fn find_trigger(lower: &str) -> Option<(usize, &'static str)> {
    CALENDAR_TRIGGERS
        .iter()
        .filter_map(|trigger| lower.find(trigger).map(|pos| (pos, *trigger)))
        .max_by_key(|(pos, trigger)| (trigger.len(), std::cmp::Reverse(*pos)))
}

fn trigger_noun(trigger: &str) -> &'static str {
    if trigger.contains("meeting") {
        "meeting"
    } else if trigger.contains("appointment") {
        "appointment"
    } else if trigger.contains("remind") {
        "reminder"
    } else {
        "event"
    }
}

fn duration_hours(caps: &regex::Captures<'_>) -> Option<f64> {
    let amount = match caps[1].to_ascii_lowercase().as_str() {
        "a" | "an" | "one" => 1.0,
        "two" => 2.0,
        "three" => 3.0,
        "half an" => 0.5,
        number => number.parse().ok()?,
    };
    if caps[2].to_ascii_lowercase().starts_with('m') {
        Some(amount / 60.0)
    } else {
        Some(amount)
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    text.get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .map(|_| &text[prefix.len()..])
}

fn strip_suffix_ignore_case<'a>(text: &'a str, suffix: &str) -> Option<&'a str> {
    let cut = text.len().checked_sub(suffix.len())?;
    text.get(cut..)
        .filter(|tail| tail.eq_ignore_ascii_case(suffix))
        .map(|_| &text[..cut])
}

fn trim_connectors(text: &str) -> &str {
    const PUNCTUATION: &[char] = &[':', ',', '-', '.', ';', ' '];
    const TRAILING: &[&str] = &[" on", " at", " by", " for", " from"];

    let mut text = text.trim_matches(PUNCTUATION);
    while let Some(stripped) = TRAILING
        .iter()
        .find_map(|word| strip_suffix_ignore_case(text, word))
    {
        text = stripped.trim_matches(PUNCTUATION);
    }
    text
}

fn drop_leading_words(text: &str) -> &str {
    const LEADING: &[&str] = &["a ", "an ", "the ", "my ", "to ", "for "];

    let mut text = text;
    while let Some(rest) = LEADING
        .iter()
        .find_map(|word| strip_prefix_ignore_case(text, word))
    {
        text = rest.trim_start();
    }
    text
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Splits a calendar request into a draft without a language model.
///
/// `"set up a meeting with John next monday at 10am for 2 hours"` gives the
/// summary `Meeting with John`, the phrase `next monday at 10am` and a
/// duration of 2 hours. Returns `None` when the message has no trigger.
pub fn draft_from_message(message: &str) -> Option<EventDraft> {
    let lower = message.to_ascii_lowercase();
    let (pos, trigger) = find_trigger(&lower)?;

    let mut remainder = format!(
        "{} {}",
        message[..pos].trim(),
        &message[pos + trigger.len()..]
    );

    let duration = DURATION
        .captures(&remainder)
        .map(|caps| (duration_hours(&caps), caps.get(0).map(|m| m.range())));
    let mut duration_hours_value = None;
    if let Some((hours, Some(range))) = duration {
        duration_hours_value = hours;
        remainder.replace_range(range, " ");
    }

    let (summary_part, when_part) = match TEMPORAL.find(&remainder) {
        Some(m) => (&remainder[..m.start()], &remainder[m.start()..]),
        None => (remainder.as_str(), ""),
    };

    let summary = drop_leading_words(trim_connectors(summary_part));
    let noun = trigger_noun(trigger);
    let summary = if summary.is_empty() {
        capitalize(noun)
    } else if ["with ", "about "]
        .iter()
        .any(|w| summary.to_ascii_lowercase().starts_with(w))
    {
        format!("{} {}", capitalize(noun), summary)
    } else {
        capitalize(summary)
    };

    let datetime_description = when_part
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', '!', '?'])
        .to_string();

    Some(EventDraft {
        summary,
        datetime_description,
        duration_hours: duration_hours_value,
        description: None,
    })
}

fn valid_duration(hours: f64) -> bool {
    hours > 0.0 && hours <= MAX_DURATION_HOURS
}

fn event_duration(hours: Option<f64>, fallback_hours: f64) -> Duration {
    let hours = match hours {
        Some(h) if valid_duration(h) => h,
        _ => fallback_hours,
    };
    Duration::seconds((hours * 3600.0).round() as i64)
}

/// Detects calendar requests and resolves them into [`CalendarIntent`]s.
#[derive(Clone)]
pub struct IntentDetector {
    generator: Option<Arc<dyn TextGenerator>>,
    default_duration_hours: f64,
}

impl Default for IntentDetector {
    fn default() -> Self {
        Self::heuristic()
    }
}

impl IntentDetector {
    /// A detector that only uses the heuristic splitter.
    pub fn heuristic() -> Self {
        Self {
            generator: None,
            default_duration_hours: DEFAULT_DURATION_HOURS,
        }
    }

    /// A detector that asks `generator` for the draft first.
    pub fn with_generator(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
            default_duration_hours: DEFAULT_DURATION_HOURS,
        }
    }

    /// Duration used when the request names none. Values outside
    /// `(0, 24]` are ignored.
    pub fn with_default_duration_hours(mut self, hours: f64) -> Self {
        if valid_duration(hours) {
            self.default_duration_hours = hours;
        }
        self
    }

    /// Turns `message` into a calendar intent, resolving dates against `now`.
    ///
    /// Returns `None` when the message is not a calendar request or when
    /// no usable summary or date could be extracted.
    pub async fn detect<Tz: TimeZone>(
        &self,
        message: &str,
        now: &DateTime<Tz>,
    ) -> Option<CalendarIntent> {
        if !has_calendar_intent(message) {
            debug!(
                "no calendar intent in message: {}",
                message.chars().take(50).collect::<String>()
            );
            return None;
        }
        info!(
            "calendar intent detected in message: {}",
            message.chars().take(100).collect::<String>()
        );

        let draft = match self.draft_with_generator(message).await {
            Some(draft) => draft,
            None => draft_from_message(message)?,
        };
        debug!(?draft, "extracted event draft");

        if draft.summary.trim().is_empty() {
            warn!("could not extract event summary from message");
            return None;
        }

        let Some(start) = parse_natural_datetime(&draft.datetime_description, now) else {
            warn!("could not parse datetime: {}", draft.datetime_description);
            return None;
        };

        let intent = CalendarIntent {
            kind: IntentKind::CreateEvent,
            summary: draft.summary,
            start: start.fixed_offset(),
            duration: event_duration(draft.duration_hours, self.default_duration_hours),
            description: draft.description,
        };
        info!("extracted calendar event: {} at {}", intent.summary, intent.start);
        Some(intent)
    }

    async fn draft_with_generator(&self, message: &str) -> Option<EventDraft> {
        let generator = self.generator.as_ref()?;
        let messages = [
            ChatMessage::system(CALENDAR_SYSTEM_PROMPT),
            ChatMessage::user(calendar_prompt(message)),
        ];

        match generator
            .generate_chat(&messages, GenerationOptions::new(150, 0.1))
            .await
        {
            Ok(response) => {
                let draft = parse_json_response(&response).and_then(|v| EventDraft::from_value(&v));
                if draft.is_none() {
                    let preview: String = response.chars().take(200).collect();
                    warn!("unusable event draft from {}: {}", generator.name(), preview);
                }
                draft
            }
            Err(e) => {
                warn!("could not extract event with {}: {}", generator.name(), e);
                None
            }
        }
    }
}
