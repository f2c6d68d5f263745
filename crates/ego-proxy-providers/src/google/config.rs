//! Google Calendar provider configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// Environment variable naming the client-secret file.
pub const CREDENTIALS_ENV: &str = "GOOGLE_CREDENTIALS_PATH";

/// File name of the client-secret JSON downloaded from the Cloud Console.
pub const CREDENTIALS_FILE_NAME: &str = "credentials.json";

/// OAuth 2.0 credentials for Google API access.
///
/// Users must provide their own OAuth client ID and secret, as Google
/// requires registered applications for API access.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    /// The OAuth 2.0 client ID from Google Cloud Console.
    pub client_id: String,
    /// The OAuth 2.0 client secret from Google Cloud Console.
    pub client_secret: String,
}

/// Structure of Google's OAuth credentials JSON file.
///
/// Supports multiple formats:
/// 1. Google Cloud Console format with "installed" or "web" section
/// 2. Flat format with client_id and client_secret at root level (e.g., from gcloud)
#[derive(Debug, Deserialize)]
struct GoogleCredentialsFile {
    installed: Option<NestedCredentials>,
    web: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    /// Creates new OAuth credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Loads OAuth credentials from a Google Cloud Console JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::configuration(format!(
                "failed to read credentials file {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses OAuth credentials from a Google credentials JSON string.
    ///
    /// Supports multiple formats:
    /// 1. Google Cloud Console format: `{"installed": {"client_id": "...", "client_secret": "..."}}`
    /// 2. Flat format: `{"client_id": "...", "client_secret": "..."}`
    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let file: GoogleCredentialsFile = serde_json::from_str(json).map_err(|e| {
            ProviderError::configuration(format!("failed to parse credentials JSON: {}", e))
        })?;

        if let Some(creds) = file.installed.or(file.web) {
            return Ok(Self::new(creds.client_id, creds.client_secret));
        }

        if let (Some(client_id), Some(client_secret)) = (file.client_id, file.client_secret) {
            return Ok(Self::new(client_id, client_secret));
        }

        Err(ProviderError::configuration(
            "credentials file must contain 'installed'/'web' section or 'client_id'/'client_secret' at root level",
        ))
    }

    /// Validates that the credentials appear to be correctly formatted.
    ///
    /// This checks that:
    /// - Client ID ends with `.apps.googleusercontent.com`
    /// - Client secret is non-empty
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err("client_id should end with .apps.googleusercontent.com");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        Ok(())
    }
}

/// Configuration for the Google Calendar provider.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// Account name, the row key in the credential table.
    /// Defaults to `"default"`.
    pub account_name: String,

    /// OAuth credentials for API access.
    pub credentials: OAuthCredentials,

    /// Calendar that events are created in and listed from.
    pub calendar_id: String,

    /// Request timeout.
    pub timeout: Duration,

    /// User agent string for API requests.
    pub user_agent: String,

    /// Port range for the loopback OAuth server.
    ///
    /// The OAuth flow binds the first free port in this range.
    /// Defaults to (8080, 8090).
    pub loopback_port_range: (u16, u16),

    /// OAuth scopes to request.
    pub scopes: Vec<String>,

    /// Base URL of the Calendar API.
    pub api_base: String,

    /// OAuth token endpoint.
    pub token_url: String,
}

impl GoogleConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Default OAuth scope: read and write access to events.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar.events";

    pub const DEFAULT_API_BASE: &'static str = "https://www.googleapis.com/calendar/v3";
    pub const DEFAULT_TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Creates a new Google configuration with the given credentials.
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            account_name: "default".to_string(),
            credentials,
            calendar_id: "primary".to_string(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("ego-proxy/{}", env!("CARGO_PKG_VERSION")),
            loopback_port_range: (8080, 8090),
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
            api_base: Self::DEFAULT_API_BASE.to_string(),
            token_url: Self::DEFAULT_TOKEN_URL.to_string(),
        }
    }

    /// Finds the client-secret file.
    ///
    /// Search order:
    /// 1. `explicit` (a command-line flag)
    /// 2. `$GOOGLE_CREDENTIALS_PATH`
    /// 3. `configured` (the configuration file)
    /// 4. `./credentials.json`
    /// 5. `~/.ego_proxy/credentials.json`
    ///
    /// The first named path is used as is: if it does not exist that is an
    /// error, the lower entries are not tried.
    pub fn resolve_credentials_path(
        explicit: Option<&Path>,
        configured: Option<&Path>,
    ) -> ProviderResult<PathBuf> {
        let from_env = std::env::var_os(CREDENTIALS_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let data_dir = ego_proxy_store::data_dir();

        let named = explicit.or(from_env.as_deref()).or(configured);
        resolve_credentials_path_in(named, &cwd, data_dir.as_deref())
    }

    /// Sets the account name.
    pub fn with_account_name(mut self, name: impl Into<String>) -> Self {
        self.account_name = name.into();
        self
    }

    /// Returns the provider name for this account (e.g. `"google:work"`).
    pub fn provider_name(&self) -> String {
        format!("google:{}", self.account_name)
    }

    pub fn with_calendar_id(mut self, id: impl Into<String>) -> Self {
        self.calendar_id = id.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the loopback port range for OAuth.
    pub fn with_loopback_port_range(mut self, start: u16, end: u16) -> Self {
        self.loopback_port_range = (start, end);
        self
    }

    /// Sets the OAuth scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Points the API client at another base URL.
    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    /// Points token exchange and refresh at another endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.credentials
            .validate()
            .map_err(|e| format!("invalid credentials: {}", e))?;

        if self.scopes.is_empty() {
            return Err("at least one OAuth scope is required".to_string());
        }

        if self.calendar_id.trim().is_empty() {
            return Err("calendar_id must not be empty".to_string());
        }

        if self.loopback_port_range.0 > self.loopback_port_range.1 {
            return Err("invalid loopback port range".to_string());
        }

        Ok(())
    }
}

fn resolve_credentials_path_in(
    named: Option<&Path>,
    cwd: &Path,
    data_dir: Option<&Path>,
) -> ProviderResult<PathBuf> {
    if let Some(path) = named {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(ProviderError::configuration(format!(
            "credentials file not found: {}",
            path.display()
        )));
    }

    let mut candidates = vec![cwd.join(CREDENTIALS_FILE_NAME)];
    if let Some(dir) = data_dir {
        candidates.push(dir.join(CREDENTIALS_FILE_NAME));
    }

    for candidate in &candidates {
        debug!("looking for credentials at {}", candidate.display());
        if candidate.is_file() {
            return Ok(candidate.clone());
        }
    }

    let searched: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
    Err(ProviderError::configuration(format!(
        "credentials file not found: set {} or place {} in one of: {}",
        CREDENTIALS_ENV,
        CREDENTIALS_FILE_NAME,
        searched.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_credentials() -> OAuthCredentials {
        OAuthCredentials::new("test-client.apps.googleusercontent.com", "test-secret")
    }

    #[test]
    fn credentials_validation() {
        let valid = test_credentials();
        assert!(valid.validate().is_ok());

        let empty_id = OAuthCredentials::new("", "secret");
        assert!(empty_id.validate().is_err());

        let bad_id = OAuthCredentials::new("bad-id", "secret");
        assert!(bad_id.validate().is_err());

        let empty_secret = OAuthCredentials::new("test.apps.googleusercontent.com", "");
        assert!(empty_secret.validate().is_err());
    }

    #[test]
    fn config_defaults() {
        let config = GoogleConfig::new(test_credentials());
        assert_eq!(config.account_name, "default");
        assert_eq!(config.calendar_id, "primary");
        assert_eq!(
            config.scopes,
            vec!["https://www.googleapis.com/auth/calendar.events".to_string()]
        );
        assert_eq!(config.provider_name(), "google:default");
    }

    #[test]
    fn config_validation() {
        let config = GoogleConfig::new(test_credentials());
        assert!(config.validate().is_ok());

        let bad_config = GoogleConfig::new(test_credentials()).with_scopes(vec![]);
        assert!(bad_config.validate().is_err());

        let bad_ports = GoogleConfig::new(test_credentials()).with_loopback_port_range(9010, 9000);
        assert!(bad_ports.validate().is_err());

        let bad_calendar = GoogleConfig::new(test_credentials()).with_calendar_id(" ");
        assert!(bad_calendar.validate().is_err());
    }

    #[test]
    fn config_builder_methods() {
        let config = GoogleConfig::new(test_credentials())
            .with_account_name("work")
            .with_calendar_id("team@example.com")
            .with_timeout(Duration::from_secs(60))
            .with_loopback_port_range(9000, 9010)
            .with_api_base("http://127.0.0.1:1")
            .with_token_url("http://127.0.0.1:1/token");

        assert_eq!(config.provider_name(), "google:work");
        assert_eq!(config.calendar_id, "team@example.com");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.loopback_port_range, (9000, 9010));
        assert_eq!(config.token_url, "http://127.0.0.1:1/token");
    }

    #[test]
    fn credentials_from_json_installed() {
        let json = r#"{
            "installed": {
                "client_id": "test-id.apps.googleusercontent.com",
                "client_secret": "test-secret",
                "project_id": "my-project",
                "redirect_uris": ["http://localhost"]
            }
        }"#;

        let creds = OAuthCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "test-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "test-secret");
    }

    #[test]
    fn credentials_from_json_web_and_flat() {
        let web = r#"{"web": {"client_id": "web-id.apps.googleusercontent.com", "client_secret": "s"}}"#;
        assert_eq!(
            OAuthCredentials::from_json(web).unwrap().client_id,
            "web-id.apps.googleusercontent.com"
        );

        let flat = r#"{"client_id": "flat-id.apps.googleusercontent.com", "client_secret": "f", "refresh_token": "x"}"#;
        assert_eq!(OAuthCredentials::from_json(flat).unwrap().client_secret, "f");
    }

    #[test]
    fn credentials_from_json_invalid() {
        let err = OAuthCredentials::from_json(r#"{ "other": {} }"#).unwrap_err();
        assert!(err.message().contains("client_id"));

        let err = OAuthCredentials::from_json("not json").unwrap_err();
        assert!(err.message().contains("parse"));
    }

    #[test]
    fn credentials_from_missing_file() {
        let err = OAuthCredentials::from_file("/nonexistent/credentials.json").unwrap_err();
        assert!(err.message().contains("failed to read credentials file"));
    }

    mod resolve {
        use super::*;

        fn write_credentials(dir: &Path) -> PathBuf {
            let path = dir.join(CREDENTIALS_FILE_NAME);
            std::fs::write(&path, "{}").unwrap();
            path
        }

        #[test]
        fn named_path_before_default_locations() {
            let tmp = tempfile::tempdir().unwrap();
            let named = write_credentials(tmp.path());
            let cwd = tempfile::tempdir().unwrap();
            write_credentials(cwd.path());

            let found = resolve_credentials_path_in(Some(&named), cwd.path(), None).unwrap();
            assert_eq!(found, named);
        }

        #[test]
        fn flag_then_env_then_config() {
            // Reads the process environment; nothing to check when it is set.
            if std::env::var_os(CREDENTIALS_ENV).is_some() {
                return;
            }
            let flag_dir = tempfile::tempdir().unwrap();
            let flag = write_credentials(flag_dir.path());
            let config_dir = tempfile::tempdir().unwrap();
            let configured = write_credentials(config_dir.path());

            let found =
                GoogleConfig::resolve_credentials_path(Some(&flag), Some(&configured)).unwrap();
            assert_eq!(found, flag);
            let found = GoogleConfig::resolve_credentials_path(None, Some(&configured)).unwrap();
            assert_eq!(found, configured);
        }

        #[test]
        fn cwd_then_data_dir() {
            let cwd = tempfile::tempdir().unwrap();
            let data = tempfile::tempdir().unwrap();
            let in_data = write_credentials(data.path());

            let found = resolve_credentials_path_in(None, cwd.path(), Some(data.path())).unwrap();
            assert_eq!(found, in_data);

            let in_cwd = write_credentials(cwd.path());
            let found = resolve_credentials_path_in(None, cwd.path(), Some(data.path())).unwrap();
            assert_eq!(found, in_cwd);
        }

        #[test]
        fn missing_explicit_is_not_found() {
            let cwd = tempfile::tempdir().unwrap();
            write_credentials(cwd.path());

            let err =
                resolve_credentials_path_in(Some(Path::new("/nonexistent/creds.json")), cwd.path(), None)
                    .unwrap_err();
            assert!(err.message().starts_with("credentials file not found"));
        }

        #[test]
        fn nothing_found() {
            let cwd = tempfile::tempdir().unwrap();
            let err = resolve_credentials_path_in(None, cwd.path(), None).unwrap_err();
            assert!(err.message().contains("credentials file not found"));
            assert!(err.message().contains(CREDENTIALS_ENV));
        }
    }
}
