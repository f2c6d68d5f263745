//! Conversation metadata extraction.
//!
//! Metadata (people, topics, referenced dates, sentiment, category) is
//! extracted either by a language model through [`MetadataExtractor`] or by
//! the keyword heuristics in [`extract_simple`]. Model output is never
//! trusted as-is: it goes through [`MessageMetadata::from_value`].

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::generator::{
    ChatMessage, ChatRole, EXTRACTION_SYSTEM_PROMPT, GenerationOptions, TextGenerator,
    extraction_prompt,
};

static JSON_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}").expect("Invalid JSON object regex")
});

static CAPITALIZED_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+\b").expect("Invalid name regex"));

/// Capitalised words that are not names.
const NOT_NAMES: &[&str] = &[
    "I", "The", "A", "An", "This", "That", "There", "Here", "Today", "Tomorrow", "Yesterday",
    "Next", "Last", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
];

const MAX_PEOPLE: usize = 5;

/// Keyword to topic label, checked in order.
const TOPIC_KEYWORDS: &[(&str, &str)] = &[
    ("meeting", "meeting"),
    ("pair", "pair programming"),
    ("programming", "programming"),
    ("code", "coding"),
    ("review", "code review"),
    ("bug", "bug fixing"),
    ("feature", "feature development"),
    ("task", "task"),
    ("project", "project"),
    ("deadline", "deadline"),
    ("presentation", "presentation"),
    ("call", "call"),
    ("email", "email"),
];

const TIME_KEYWORDS: &[&str] = &[
    "today",
    "tomorrow",
    "yesterday",
    "last week",
    "next week",
    "last time",
    "next time",
    "this morning",
    "this afternoon",
    "tonight",
    "last session",
    "next session",
];

const POSITIVE_WORDS: &[&str] = &["happy", "good", "great", "excellent", "excited", "glad"];
const NEGATIVE_WORDS: &[&str] = &[
    "sad",
    "bad",
    "angry",
    "frustrated",
    "upset",
    "worried",
    "concerned",
];

/// Structured metadata attached to a conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// People mentioned by name.
    pub people: Vec<String>,
    /// Lower-case topic labels.
    pub topics: Vec<String>,
    /// Dates or times referenced, as written.
    pub dates_mentioned: Option<String>,
    /// Lower-case sentiment label; `neutral` by default.
    pub sentiment: String,
    /// Lower-case category label; `general` by default.
    pub category: String,
}

impl Default for MessageMetadata {
    fn default() -> Self {
        Self {
            people: Vec::new(),
            topics: Vec::new(),
            dates_mentioned: None,
            sentiment: "neutral".to_string(),
            category: "general".to_string(),
        }
    }
}

impl MessageMetadata {
    /// Builds validated metadata from untrusted JSON.
    ///
    /// Lists that are not arrays become empty; entries are stringified and
    /// trimmed, empty entries dropped; topics, sentiment and category are
    /// lower-cased. Missing or empty scalars take their defaults.
    pub fn from_value(value: &Value) -> Self {
        let defaults = Self::default();
        Self {
            people: string_list(value.get("people"), false),
            topics: string_list(value.get("topics"), true),
            dates_mentioned: scalar(value.get("dates_mentioned")),
            sentiment: scalar(value.get("sentiment"))
                .map(|s| s.to_lowercase())
                .unwrap_or(defaults.sentiment),
            category: scalar(value.get("category"))
                .map(|s| s.to_lowercase())
                .unwrap_or(defaults.category),
        }
    }

    /// Returns true if nothing beyond the defaults was extracted.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::Bool(false) => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn string_list(value: Option<&Value>, lowercase: bool) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(value_to_string)
            .map(|s| if lowercase { s.to_lowercase() } else { s })
            .collect(),
        _ => Vec::new(),
    }
}

fn scalar(value: Option<&Value>) -> Option<String> {
    value.and_then(value_to_string)
}

/// Finds the JSON object in a model reply.
///
/// Models often wrap the object in prose or code fences, so the first
/// `{...}` block (one level of nesting allowed) is tried before the whole
/// reply.
pub fn parse_json_response(response: &str) -> Option<Value> {
    if let Some(found) = JSON_OBJECT.find(response)
        && let Ok(value) = serde_json::from_str::<Value>(found.as_str())
    {
        return Some(value);
    }

    match serde_json::from_str::<Value>(response.trim()) {
        Ok(value) => Some(value),
        Err(_) => {
            let preview: String = response.chars().take(100).collect();
            warn!("could not parse JSON from response: {}", preview);
            None
        }
    }
}

/// Extracts metadata with keyword heuristics only.
pub fn extract_simple(message: &str) -> MessageMetadata {
    let mut metadata = MessageMetadata::default();
    let lower = message.to_lowercase();

    let mut seen = HashSet::new();
    metadata.people = CAPITALIZED_WORD
        .find_iter(message)
        .map(|m| m.as_str())
        .filter(|word| !NOT_NAMES.contains(word))
        .filter(|word| seen.insert(*word))
        .take(MAX_PEOPLE)
        .map(str::to_string)
        .collect();

    metadata.topics = TOPIC_KEYWORDS
        .iter()
        .filter(|(keyword, _)| lower.contains(keyword))
        .map(|(_, topic)| topic.to_string())
        .collect();

    let dates: Vec<&str> = TIME_KEYWORDS
        .iter()
        .copied()
        .filter(|keyword| lower.contains(keyword))
        .collect();
    if !dates.is_empty() {
        metadata.dates_mentioned = Some(dates.join(", "));
    }

    let contains_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if contains_any(NEGATIVE_WORDS) {
        metadata.sentiment = "negative".to_string();
    } else if contains_any(POSITIVE_WORDS) {
        metadata.sentiment = "positive".to_string();
    }

    if contains_any(&["meeting", "call", "presentation"]) {
        metadata.category = "meeting".to_string();
    } else if contains_any(&["code", "programming", "bug", "feature"]) {
        metadata.category = "technical".to_string();
    } else if contains_any(&["task", "deadline", "project"]) {
        metadata.category = "task".to_string();
    }

    metadata
}

/// Extracts metadata through a language model.
pub struct MetadataExtractor {
    generator: Arc<dyn TextGenerator>,
}

impl MetadataExtractor {
    /// Messages shorter than this (after trimming) are not analysed.
    pub const MIN_MESSAGE_LEN: usize = 5;

    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Extracts metadata from one message.
    ///
    /// Never fails: generator errors and unparseable replies yield the
    /// default metadata.
    pub async fn extract(&self, message: &str, role: ChatRole) -> MessageMetadata {
        if message.trim().chars().count() < Self::MIN_MESSAGE_LEN {
            return MessageMetadata::default();
        }

        let messages = [
            ChatMessage::system(EXTRACTION_SYSTEM_PROMPT),
            ChatMessage::user(extraction_prompt(message, role)),
        ];

        let response = match self
            .generator
            .generate_chat(&messages, GenerationOptions::new(256, 0.1))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("could not extract metadata with {}: {}", self.generator.name(), e);
                return MessageMetadata::default();
            }
        };

        let metadata = parse_json_response(&response)
            .map(|value| MessageMetadata::from_value(&value))
            .unwrap_or_default();
        debug!(?metadata, "extracted metadata");
        metadata
    }

    /// Extracts metadata from several user messages, in order.
    pub async fn extract_batch(&self, messages: &[String]) -> Vec<MessageMetadata> {
        let mut results = Vec::with_capacity(messages.len());
        for message in messages {
            results.push(self.extract(message, ChatRole::User).await);
        }
        results
    }
}
