//! Calendar and language-model backends.
//!
//! - [`CalendarProvider`] - the trait calendar backends implement
//! - [`google::GoogleProvider`] - Google Calendar over OAuth 2.0
//! - [`llm::ChatCompletionsClient`] - OpenAI-compatible [`TextGenerator`]
//! - [`ProviderError`] - error type shared by all backends
//!
//! # Example
//!
//! ```ignore
//! use ego_proxy_providers::{CalendarProvider, EventQuery};
//!
//! async fn upcoming(provider: &dyn CalendarProvider) -> ProviderResult<Vec<CalendarEvent>> {
//!     provider.list_events(EventQuery::new().with_max_results(10)).await
//! }
//! ```
//!
//! [`TextGenerator`]: ego_proxy_core::TextGenerator

pub mod error;
#[cfg(feature = "google")]
pub mod google;
#[cfg(feature = "llm")]
pub mod llm;
pub mod provider;

#[cfg(test)]
mod testing;

pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use provider::{
    BoxFuture, CalendarInfo, CalendarProvider, EventQuery, ProviderStatus,
};
