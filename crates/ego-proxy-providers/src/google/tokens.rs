//! OAuth token storage and management.
//!
//! Tokens are cached in memory and persisted encrypted through
//! [`CredentialStore`], one row per account in `calendar_credentials`.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, TimeDelta, Utc};
use ego_proxy_store::CredentialStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ProviderResult;

/// Seconds subtracted from the advertised lifetime so tokens are refreshed
/// before Google starts rejecting them.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Longest lifetime accepted from a token response.
const MAX_LIFETIME_SECS: i64 = 366 * 24 * 3600;

fn expiry_from(expires_in_secs: Option<i64>) -> Option<DateTime<Utc>> {
    let secs = expires_in_secs?.clamp(0, MAX_LIFETIME_SECS) - EXPIRY_MARGIN_SECS;
    let now = Utc::now();
    let expiry = TimeDelta::try_seconds(secs).and_then(|delta| now.checked_add_signed(delta));
    Some(expiry.unwrap_or(now))
}

/// Information about an OAuth token set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// The access token for API requests.
    pub access_token: String,

    /// The refresh token for obtaining new access tokens.
    pub refresh_token: Option<String>,

    /// When the access token expires, minus a safety margin.
    pub expires_at: Option<DateTime<Utc>>,

    /// The OAuth scopes that were granted.
    pub scopes: Vec<String>,

    /// When the tokens were last refreshed.
    pub last_refresh: DateTime<Utc>,
}

impl TokenInfo {
    /// Creates a new token info from OAuth response data.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expiry_from(expires_in_secs),
            scopes,
            last_refresh: Utc::now(),
        }
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Tokens without an expiry never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Returns true if an expired access token can be renewed.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Returns true if the token has the required scopes.
    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Updates the access token after a refresh.
    pub fn update_access_token(
        &mut self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
    ) {
        self.access_token = access_token.into();
        self.expires_at = expiry_from(expires_in_secs);
        self.last_refresh = Utc::now();
    }

}

/// Token cache backed by the encrypted credential store.
pub struct TokenStorage {
    store: Arc<CredentialStore>,
    account: String,
    /// In-memory cache of the current tokens.
    tokens: RwLock<Option<TokenInfo>>,
}

impl TokenStorage {
    /// Creates token storage for `account`. Nothing is read until [`load`].
    ///
    /// [`load`]: TokenStorage::load
    pub fn new(store: Arc<CredentialStore>, account: impl Into<String>) -> Self {
        Self {
            store,
            account: account.into(),
            tokens: RwLock::new(None),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Loads tokens from the store into memory.
    ///
    /// Returns Ok(true) if tokens were loaded, Ok(false) if none are stored.
    pub fn load(&self) -> ProviderResult<bool> {
        match self.store.load::<TokenInfo>(&self.account)? {
            Some(tokens) => {
                debug!("loaded tokens for account '{}'", self.account);
                *self.tokens.write().unwrap() = Some(tokens);
                Ok(true)
            }
            None => {
                debug!("no stored tokens for account '{}'", self.account);
                Ok(false)
            }
        }
    }

    fn save(&self, tokens: &TokenInfo) -> ProviderResult<()> {
        self.store.save(&self.account, tokens)?;
        debug!("saved tokens for account '{}'", self.account);
        Ok(())
    }

    /// Returns a clone of the current tokens, if any.
    pub fn get(&self) -> Option<TokenInfo> {
        self.tokens.read().unwrap().clone()
    }

    /// Sets new tokens and persists them.
    ///
    /// A token set without a refresh token keeps the previously stored one:
    /// Google only returns it on the first consent.
    pub fn set(&self, mut tokens: TokenInfo) -> ProviderResult<()> {
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = self.get().and_then(|t| t.refresh_token);
        }
        self.save(&tokens)?;
        *self.tokens.write().unwrap() = Some(tokens);
        Ok(())
    }

    /// Updates the access token and persists it.
    pub fn update_access_token(
        &self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
    ) -> ProviderResult<TokenInfo> {
        let mut tokens = self.get().ok_or_else(|| {
            crate::error::ProviderError::internal("no tokens to update")
        })?;
        tokens.update_access_token(access_token, expires_in_secs);
        self.save(&tokens)?;
        *self.tokens.write().unwrap() = Some(tokens.clone());
        Ok(tokens)
    }

    /// Clears the stored tokens, in memory and in the database.
    ///
    /// Returns true if a row was deleted.
    pub fn clear(&self) -> ProviderResult<bool> {
        *self.tokens.write().unwrap() = None;
        let removed = self.store.remove(&self.account)?;
        if removed {
            info!("removed stored tokens for account '{}'", self.account);
        }
        Ok(removed)
    }

    /// Returns true if tokens are loaded and not expired.
    pub fn has_valid_tokens(&self) -> bool {
        self.tokens
            .read()
            .unwrap()
            .as_ref()
            .is_some_and(|t| !t.is_expired())
    }

    /// Checks if re-authentication is needed due to scope changes.
    ///
    /// Returns true if the required scopes are not present in the stored tokens.
    pub fn needs_reauth(&self, required_scopes: &[String]) -> bool {
        match self.tokens.read().unwrap().as_ref() {
            None => true,
            Some(tokens) => !tokens.has_scopes(required_scopes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn open_store(dir: &tempfile::TempDir) -> Arc<CredentialStore> {
        Arc::new(
            CredentialStore::open(
                dir.path().join("assistant_memory.db"),
                dir.path().join("calendar_key.bin"),
            )
            .unwrap(),
        )
    }

    #[test]
    fn token_info_creation() {
        let token = TokenInfo::new(
            "access-token",
            Some("refresh-token".to_string()),
            Some(3600),
            vec!["scope1".to_string()],
        );

        assert_eq!(token.access_token, "access-token");
        assert!(token.can_refresh());
        assert!(!token.is_expired());

        let remaining = token.expires_at.unwrap() - Utc::now();
        assert!(remaining <= Duration::seconds(3600 - EXPIRY_MARGIN_SECS));
        assert!(remaining > Duration::seconds(3400));
    }

    #[test]
    fn out_of_range_lifetimes_are_clamped() {
        let token = TokenInfo::new("access", None, Some(i64::MAX), vec![]);
        let expires_at = token.expires_at.unwrap();
        assert!(expires_at - Utc::now() <= Duration::seconds(MAX_LIFETIME_SECS));
        assert!(!token.is_expired());

        let token = TokenInfo::new("access", None, Some(i64::MIN), vec![]);
        assert!(token.is_expired());
    }

    #[test]
    fn token_info_expiry_margin() {
        let token = TokenInfo::new("access", None, Some(30), vec![]);
        assert!(token.is_expired());

        let token = TokenInfo::new("access", None, None, vec![]);
        assert!(!token.is_expired_at(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn token_info_scope_check() {
        let token = TokenInfo::new(
            "access",
            None,
            None,
            vec!["scope1".to_string(), "scope2".to_string()],
        );

        assert!(token.has_scopes(&["scope1".to_string()]));
        assert!(token.has_scopes(&["scope1".to_string(), "scope2".to_string()]));
        assert!(!token.has_scopes(&["scope3".to_string()]));
    }

    #[test]
    fn storage_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let storage = TokenStorage::new(store.clone(), "default");

        let token = TokenInfo::new(
            "access-token",
            Some("refresh-token".to_string()),
            Some(3600),
            vec!["scope1".to_string()],
        );
        storage.set(token.clone()).unwrap();

        let reloaded = TokenStorage::new(store, "default");
        assert!(reloaded.load().unwrap());
        assert_eq!(reloaded.get(), Some(token));
        assert!(reloaded.has_valid_tokens());
        assert!(reloaded.get().is_some_and(|t| t.can_refresh()));
    }

    #[test]
    fn storage_keeps_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(open_store(&dir), "default");

        storage
            .set(TokenInfo::new("first", Some("refresh".into()), Some(3600), vec![]))
            .unwrap();
        storage
            .set(TokenInfo::new("second", None, Some(3600), vec![]))
            .unwrap();

        let tokens = storage.get().unwrap();
        assert_eq!(tokens.access_token, "second");
        assert_eq!(tokens.refresh_token.as_deref(), Some("refresh"));
    }

    #[test]
    fn storage_update_access_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let storage = TokenStorage::new(store.clone(), "default");
        assert!(storage.update_access_token("new", Some(3600)).is_err());

        let mut expired = TokenInfo::new("old", Some("refresh".into()), Some(3600), vec![]);
        expired.expires_at = Some(Utc::now() - Duration::hours(1));
        storage.set(expired).unwrap();
        assert!(!storage.has_valid_tokens());

        let updated = storage.update_access_token("new", Some(3600)).unwrap();
        assert_eq!(updated.access_token, "new");
        assert!(storage.has_valid_tokens());

        let reloaded = TokenStorage::new(store, "default");
        reloaded.load().unwrap();
        assert_eq!(reloaded.get().unwrap().access_token, "new");
    }

    #[test]
    fn storage_accounts_are_separate() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let work = TokenStorage::new(store.clone(), "work");
        work.set(TokenInfo::new("w", None, None, vec![])).unwrap();

        let personal = TokenStorage::new(store, "personal");
        assert!(!personal.load().unwrap());
        assert!(personal.get().is_none());
    }

    #[test]
    fn storage_clear() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(open_store(&dir), "default");

        storage.set(TokenInfo::new("access", None, None, vec![])).unwrap();
        assert!(storage.clear().unwrap());
        assert!(storage.get().is_none());
        assert!(!storage.load().unwrap());
        assert!(!storage.clear().unwrap());
    }

    #[test]
    fn storage_needs_reauth() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(open_store(&dir), "default");

        assert!(storage.needs_reauth(&["scope1".to_string()]));

        let token = TokenInfo::new("access", None, None, vec!["scope1".to_string()]);
        storage.set(token).unwrap();
        assert!(!storage.needs_reauth(&["scope1".to_string()]));
        assert!(storage.needs_reauth(&["scope2".to_string()]));
    }
}
