//! CalendarProvider trait definition.
//!
//! Providers are responsible for:
//! - Creating, listing and deleting events
//! - Handling authentication and token refresh

use ego_proxy_core::{CalendarEvent, NewEvent, TimeWindow};

pub use ego_proxy_core::BoxFuture;

use crate::error::ProviderResult;

/// Information about a calendar.
#[derive(Debug, Clone)]
pub struct CalendarInfo {
    /// Unique identifier for the calendar.
    pub id: String,
    /// Human-readable name of the calendar.
    pub name: String,
    /// Description of the calendar, if available.
    pub description: Option<String>,
    /// Whether this is the primary calendar.
    pub is_primary: bool,
    /// The timezone of the calendar (IANA identifier).
    pub timezone: Option<String>,
    /// The user's access role (`owner`, `writer`, `reader`...).
    pub access_role: Option<String>,
}

impl CalendarInfo {
    /// Creates a new CalendarInfo with the given ID and name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            is_primary: false,
            timezone: None,
            access_role: None,
        }
    }

    /// Builder method to mark as primary.
    pub fn with_primary(mut self, is_primary: bool) -> Self {
        self.is_primary = is_primary;
        self
    }

    /// Builder method to set timezone.
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    /// Returns true if events can be created in this calendar.
    pub fn is_writable(&self) -> bool {
        matches!(self.access_role.as_deref(), Some("owner" | "writer"))
    }
}

/// Options for listing events.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Time window to list events for. Providers pick a default when unset.
    pub time_window: Option<TimeWindow>,
    /// Maximum number of events to return.
    pub max_results: Option<usize>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_window(mut self, window: TimeWindow) -> Self {
        self.time_window = Some(window);
        self
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }
}

/// Status information about a provider.
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    /// The provider name/type.
    pub provider_type: String,
    /// Whether the provider is currently authenticated.
    pub is_authenticated: bool,
    /// When the access token expires, if known.
    pub token_expires_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Whether an expired access token can be refreshed.
    pub can_refresh: bool,
    /// Granted OAuth scopes.
    pub scopes: Vec<String>,
    /// The last successful API call, if any.
    pub last_sync: Option<chrono::DateTime<chrono::Utc>>,
    /// Any current error state.
    pub error: Option<String>,
}

impl ProviderStatus {
    /// Creates a new provider status.
    pub fn new(provider_type: impl Into<String>) -> Self {
        Self {
            provider_type: provider_type.into(),
            is_authenticated: false,
            token_expires_at: None,
            can_refresh: false,
            scopes: Vec::new(),
            last_sync: None,
            error: None,
        }
    }
}

/// The core abstraction for calendar providers.
///
/// Methods return boxed futures so the trait stays object-safe; callers
/// hold providers as `Box<dyn CalendarProvider>`.
pub trait CalendarProvider: Send + Sync {
    /// Returns the name/type of this provider (e.g., "google:default").
    fn name(&self) -> &str;

    /// Creates an event and returns it as stored by the calendar.
    fn create_event(&self, event: NewEvent) -> BoxFuture<'_, ProviderResult<CalendarEvent>>;

    /// Lists events ordered by start time, expanding recurring events.
    fn list_events(&self, query: EventQuery) -> BoxFuture<'_, ProviderResult<Vec<CalendarEvent>>>;

    /// Deletes an event by its provider identifier.
    fn delete_event<'a>(&'a self, event_id: &'a str) -> BoxFuture<'a, ProviderResult<()>>;

    /// Lists the calendars the user has access to.
    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarInfo>>>;

    /// Returns the current status of the provider. Never fails.
    fn status(&self) -> BoxFuture<'_, ProviderStatus>;

    /// Exchanges the refresh token for a new access token, even when the
    /// current one is still valid.
    fn refresh_auth(&self) -> BoxFuture<'_, ProviderResult<()>>;

    /// Checks if the provider has usable or refreshable credentials.
    fn is_authenticated(&self) -> bool;
}
