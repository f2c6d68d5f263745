//! Language-model seam used by intent detection and metadata extraction.
//!
//! The assistant only needs chat-style completion. Backends implement
//! [`TextGenerator`]; the HTTP client lives in `ego-proxy-providers`.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message of a chat prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Sampling parameters for a single generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    /// Upper bound on generated tokens.
    pub max_new_tokens: u32,
    /// Sampling temperature. Extraction tasks use a low value.
    pub temperature: f32,
}

impl GenerationOptions {
    pub fn new(max_new_tokens: u32, temperature: f32) -> Self {
        Self {
            max_new_tokens,
            temperature,
        }
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::new(256, 0.7)
    }
}

/// Errors returned by a [`TextGenerator`].
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The backend could not be reached.
    #[error("generator request failed: {0}")]
    Request(String),

    /// The backend answered with something unusable.
    #[error("invalid generator response: {0}")]
    InvalidResponse(String),

    /// The backend refused the request (bad credentials, unknown model...).
    #[error("generator rejected the request: {0}")]
    Rejected(String),
}

/// A chat-completion backend.
pub trait TextGenerator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Generates the assistant reply for `messages`.
    fn generate_chat<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        options: GenerationOptions,
    ) -> BoxFuture<'a, Result<String, GeneratorError>>;
}

/// System prompt for metadata extraction.
pub const EXTRACTION_SYSTEM_PROMPT: &str = "You analyse chat messages and extract structured \
metadata. Always respond with a single JSON object and nothing else.";

/// Builds the user prompt for metadata extraction.
pub fn extraction_prompt(message: &str, role: ChatRole) -> String {
    format!(
        r#"Extract metadata from this {role} message:
"{message}"

Respond with JSON containing:
- people: names of people mentioned (list of strings)
- topics: short topic labels (list of strings)
- dates_mentioned: any dates or times referenced, as written (string or null)
- sentiment: one of "positive", "negative", "neutral"
- category: one of "meeting", "technical", "task", "personal", "general"

JSON response:"#,
        role = role.as_str(),
    )
}

/// System prompt for calendar event extraction.
pub const CALENDAR_SYSTEM_PROMPT: &str = "You are a helpful assistant that extracts calendar \
event information. Always respond with valid JSON only.";

/// Builds the user prompt for calendar event extraction.
pub fn calendar_prompt(message: &str) -> String {
    format!(
        r#"Extract calendar event details from this message:
"{message}"

Respond with JSON containing:
- summary: Brief event title (required)
- datetime_description: When the event should happen (e.g., "tomorrow at 3pm", "next Monday at 10am")
- duration_hours: Event duration in hours (default 1.0)
- description: Optional additional details

Example response:
{{"summary": "Meeting with John", "datetime_description": "tomorrow at 3pm", "duration_hours": 1.0, "description": null}}

JSON response:"#
    )
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_serializes_with_lowercase_role() {
        let json = serde_json::to_string(&ChatMessage::system("hi")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"hi"}"#);
    }

    #[test]
    fn prompts_embed_message() {
        let prompt = calendar_prompt("add meeting tomorrow at 3pm");
        assert!(prompt.contains("\"add meeting tomorrow at 3pm\""));
        assert!(prompt.contains("datetime_description"));

        let prompt = extraction_prompt("Lunch with Sarah", ChatRole::User);
        assert!(prompt.contains("user message"));
        assert!(prompt.contains("Lunch with Sarah"));
    }

    #[test]
    fn default_options() {
        let options = GenerationOptions::default();
        assert_eq!(options.max_new_tokens, 256);
    }
}
