//! Google Calendar provider implementation.
//!
//! This module implements the [`CalendarProvider`] trait for Google Calendar.

use std::future::Future;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use ego_proxy_core::{CalendarEvent, NewEvent, TimeWindow};
use ego_proxy_store::CredentialStore;
use tokio::sync::RwLock as TokioRwLock;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, CalendarInfo, CalendarProvider, EventQuery, ProviderStatus};

use super::client::GoogleCalendarClient;
use super::config::GoogleConfig;
use super::oauth::OAuthClient;
use super::tokens::{TokenInfo, TokenStorage};

/// Days listed when a query carries no time window.
const DEFAULT_WINDOW_DAYS: u32 = 7;

const NOT_AUTHENTICATED: &str = "not authenticated - run 'ego-proxy auth google'";
const NO_REFRESH_TOKEN: &str = "token expired and no refresh token - run 'ego-proxy auth google'";

/// Google Calendar provider.
///
/// Tokens are loaded from the credential store on creation. Expired access
/// tokens are refreshed before each call, and a call rejected with 401 is
/// retried once after a forced refresh.
pub struct GoogleProvider {
    config: GoogleConfig,
    display_name: String,
    token_storage: TokenStorage,
    oauth_client: OAuthClient,
    api_client: TokioRwLock<Option<GoogleCalendarClient>>,
    last_sync: RwLock<Option<DateTime<Utc>>>,
}

impl GoogleProvider {
    /// Creates a provider for `config.account_name`.
    ///
    /// Stored tokens are loaded but authentication is not started; call
    /// [`authenticate`](Self::authenticate) when [`is_authenticated`]
    /// returns false.
    ///
    /// [`is_authenticated`]: CalendarProvider::is_authenticated
    pub fn new(config: GoogleConfig, store: Arc<CredentialStore>) -> ProviderResult<Self> {
        config.validate().map_err(ProviderError::configuration)?;

        let display_name = config.provider_name();
        let token_storage = TokenStorage::new(store, &config.account_name);
        token_storage.load()?;

        let oauth_client = OAuthClient::new(
            config.credentials.clone(),
            config.token_url.clone(),
            config.timeout,
        )?;

        Ok(Self {
            config,
            display_name,
            token_storage,
            oauth_client,
            api_client: TokioRwLock::new(None),
            last_sync: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    /// Runs the browser consent flow and stores the granted tokens.
    pub async fn authenticate(&self) -> ProviderResult<TokenInfo> {
        info!("starting Google authentication flow");

        let tokens = self
            .oauth_client
            .authorize(&self.config.scopes, self.config.loopback_port_range)
            .await?;

        self.token_storage.set(tokens.clone())?;
        *self.api_client.write().await = Some(self.new_client(&tokens.access_token)?);

        info!(
            "authentication successful for account '{}'",
            self.config.account_name
        );
        Ok(self.token_storage.get().unwrap_or(tokens))
    }

    /// Removes this account's stored tokens. Returns true if any existed.
    pub async fn sign_out(&self) -> ProviderResult<bool> {
        *self.api_client.write().await = None;
        self.token_storage.clear()
    }

    /// The current tokens, if any.
    pub fn token_info(&self) -> Option<TokenInfo> {
        self.token_storage.get()
    }

    /// Checks if re-authentication is needed (no tokens or missing scopes).
    pub fn needs_reauth(&self) -> bool {
        self.token_storage.needs_reauth(&self.config.scopes)
    }

    fn new_client(&self, access_token: &str) -> ProviderResult<GoogleCalendarClient> {
        GoogleCalendarClient::new(
            access_token,
            self.config.api_base.clone(),
            self.config.timeout,
            &self.config.user_agent,
        )
    }

    /// Returns an API client with a usable access token.
    async fn ensure_client(&self) -> ProviderResult<GoogleCalendarClient> {
        {
            let client = self.api_client.read().await;
            if let Some(client) = client.as_ref()
                && self.token_storage.has_valid_tokens()
            {
                return Ok(client.clone());
            }
        }

        self.ensure_authenticated().await
    }

    /// Refreshes expired tokens and (re)creates the API client.
    async fn ensure_authenticated(&self) -> ProviderResult<GoogleCalendarClient> {
        let tokens = self
            .token_storage
            .get()
            .ok_or_else(|| ProviderError::authentication(NOT_AUTHENTICATED))?;

        if tokens.is_expired() {
            debug!("access token expired");
            return self.refresh().await;
        }

        let mut slot = self.api_client.write().await;
        match slot.as_mut() {
            Some(client) => {
                client.set_access_token(&tokens.access_token);
                Ok(client.clone())
            }
            None => {
                let client = self.new_client(&tokens.access_token)?;
                *slot = Some(client.clone());
                Ok(client)
            }
        }
    }

    /// Exchanges the refresh token for a new access token, regardless of
    /// the current expiry.
    async fn refresh(&self) -> ProviderResult<GoogleCalendarClient> {
        let tokens = self
            .token_storage
            .get()
            .ok_or_else(|| ProviderError::authentication(NOT_AUTHENTICATED))?;
        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .ok_or_else(|| ProviderError::authentication(NO_REFRESH_TOKEN))?;

        debug!("refreshing access token");
        let (access_token, expires_in) = self.oauth_client.refresh_token(refresh_token).await?;
        self.token_storage
            .update_access_token(&access_token, expires_in)?;

        let mut slot = self.api_client.write().await;
        match slot.as_mut() {
            Some(client) => {
                client.set_access_token(&access_token);
                Ok(client.clone())
            }
            None => {
                let client = self.new_client(&access_token)?;
                *slot = Some(client.clone());
                Ok(client)
            }
        }
    }

    /// Runs `op` with a fresh client; a 401 triggers one refresh and retry.
    async fn call<T, F, Fut>(&self, op: F) -> ProviderResult<T>
    where
        F: Fn(GoogleCalendarClient) -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let client = self.ensure_client().await.map_err(|e| self.tag(e))?;

        let result = match op(client).await {
            Err(e) if e.is_authentication() => {
                warn!("access token rejected, refreshing and retrying once");
                let client = self.refresh().await.map_err(|e| self.tag(e))?;
                op(client).await
            }
            other => other,
        };

        if result.is_ok() {
            *self.last_sync.write().unwrap() = Some(Utc::now());
        }
        result.map_err(|e| self.tag(e))
    }

    fn tag(&self, error: ProviderError) -> ProviderError {
        error.with_provider(&self.display_name)
    }

    async fn create_event_impl(&self, event: NewEvent) -> ProviderResult<CalendarEvent> {
        let calendar_id = self.config.calendar_id.as_str();
        let event = &event;

        let created = self
            .call(|client| async move { client.insert_event(calendar_id, event).await })
            .await?;
        info!("created event {} in calendar {}", created.id, calendar_id);
        Ok(created)
    }

    async fn list_events_impl(&self, query: EventQuery) -> ProviderResult<Vec<CalendarEvent>> {
        let calendar_id = self.config.calendar_id.as_str();
        let window = query
            .time_window
            .unwrap_or_else(|| TimeWindow::days_ahead(Utc::now(), DEFAULT_WINDOW_DAYS));
        let window = &window;
        let max_results = query.max_results;

        self.call(|client| async move {
            client.list_events(calendar_id, window, max_results).await
        })
        .await
    }

    async fn delete_event_impl(&self, event_id: &str) -> ProviderResult<()> {
        let calendar_id = self.config.calendar_id.as_str();

        self.call(|client| async move { client.delete_event(calendar_id, event_id).await })
            .await?;
        info!("deleted event {} from calendar {}", event_id, calendar_id);
        Ok(())
    }

    async fn list_calendars_impl(&self) -> ProviderResult<Vec<CalendarInfo>> {
        let calendars = self
            .call(|client| async move { client.list_calendars().await })
            .await?;

        Ok(calendars
            .into_iter()
            .map(|c| {
                let mut info = CalendarInfo::new(&c.id, &c.summary).with_primary(c.primary);
                if let Some(tz) = c.time_zone {
                    info = info.with_timezone(tz);
                }
                info.description = c.description;
                info.access_role = c.access_role;
                info
            })
            .collect())
    }
}

impl CalendarProvider for GoogleProvider {
    fn name(&self) -> &str {
        &self.display_name
    }

    fn create_event(&self, event: NewEvent) -> BoxFuture<'_, ProviderResult<CalendarEvent>> {
        Box::pin(async move { self.create_event_impl(event).await })
    }

    fn list_events(&self, query: EventQuery) -> BoxFuture<'_, ProviderResult<Vec<CalendarEvent>>> {
        Box::pin(async move { self.list_events_impl(query).await })
    }

    fn delete_event<'a>(&'a self, event_id: &'a str) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move { self.delete_event_impl(event_id).await })
    }

    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarInfo>>> {
        Box::pin(async move { self.list_calendars_impl().await })
    }

    fn status(&self) -> BoxFuture<'_, ProviderStatus> {
        Box::pin(async move {
            let mut status = ProviderStatus::new(&self.display_name);

            status.is_authenticated = self.is_authenticated();
            status.last_sync = *self.last_sync.read().unwrap();

            match self.token_storage.get() {
                Some(tokens) => {
                    status.token_expires_at = tokens.expires_at;
                    status.can_refresh = tokens.can_refresh();
                    if tokens.is_expired() && !tokens.can_refresh() {
                        status.error = Some("token expired and no refresh token".to_string());
                    } else if !tokens.has_scopes(&self.config.scopes) {
                        status.error = Some("granted scopes differ from configured scopes".to_string());
                    }
                    status.scopes = tokens.scopes;
                }
                None => status.error = Some("not authenticated".to_string()),
            }

            status
        })
    }

    fn refresh_auth(&self) -> BoxFuture<'_, ProviderResult<()>> {
        Box::pin(async move {
            self.refresh().await.map(|_| ()).map_err(|e| self.tag(e))
        })
    }

    fn is_authenticated(&self) -> bool {
        self.token_storage
            .get()
            .is_some_and(|tokens| !tokens.is_expired() || tokens.can_refresh())
    }
}
