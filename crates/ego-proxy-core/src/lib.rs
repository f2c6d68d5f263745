//! Core types: natural-language dates, calendar intents, message metadata

pub mod datetime;
pub mod event;
pub mod generator;
pub mod intent;
pub mod metadata;
pub mod time;
pub mod tracing;

pub use datetime::parse_natural_datetime;
pub use event::{CalendarEvent, NewEvent};
pub use generator::{
    BoxFuture, ChatMessage, ChatRole, GenerationOptions, GeneratorError, TextGenerator,
};
pub use intent::{
    CALENDAR_TRIGGERS, CalendarIntent, EventDraft, IntentDetector, IntentKind, draft_from_message,
    has_calendar_intent,
};
pub use metadata::{MessageMetadata, MetadataExtractor, extract_simple, parse_json_response};
pub use time::{EventTime, TimeWindow};
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
