//! Client configuration.
//!
//! All settings live in a single `config.toml`, by default
//! `~/.ego_proxy/config.toml`. Every section and key is optional.
//!
//! `llm.api_key` supports secret references (see [`crate::secret`]).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ego_proxy_providers::google::{GoogleConfig, OAuthCredentials};
use ego_proxy_providers::llm::LlmConfig;
use ego_proxy_store::CredentialStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ClientError, ClientResult};

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration for the ego-proxy client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub google: GoogleSettings,
    pub storage: StorageSettings,
    pub llm: LlmSettings,
    pub assistant: AssistantSettings,
}

/// Google Calendar settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// OAuth client-secret JSON. When unset the usual locations are searched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,

    /// Calendar that events are created in and listed from.
    pub calendar_id: String,

    /// Row key of the stored tokens.
    pub account: String,

    /// Ports tried, in order, for the OAuth redirect listener.
    pub loopback_port_range: (u16, u16),

    pub timeout_secs: u64,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            credentials_path: None,
            calendar_id: "primary".to_string(),
            account: "default".to_string(),
            loopback_port_range: (8080, 8090),
            timeout_secs: GoogleConfig::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl GoogleSettings {
    /// Builds the provider configuration.
    ///
    /// `credentials_file` (from the command line) takes precedence over
    /// `$GOOGLE_CREDENTIALS_PATH`, which takes precedence over
    /// `credentials_path`. Without any of them the default locations are
    /// searched.
    pub fn to_provider_config(&self, credentials_file: Option<&Path>) -> ClientResult<GoogleConfig> {
        let path = GoogleConfig::resolve_credentials_path(
            credentials_file,
            self.credentials_path.as_deref(),
        )?;
        debug!("using Google credentials from {}", path.display());

        let credentials = OAuthCredentials::from_file(&path)?;
        credentials.validate().map_err(|e| {
            ClientError::Config(format!("invalid credentials in {}: {}", path.display(), e))
        })?;

        let config = GoogleConfig::new(credentials)
            .with_account_name(&self.account)
            .with_calendar_id(&self.calendar_id)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_loopback_port_range(self.loopback_port_range.0, self.loopback_port_range.1);
        config.validate().map_err(ClientError::Config)?;
        Ok(config)
    }
}

/// Credential store location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Defaults to `~/.ego_proxy/assistant_memory.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Defaults to `~/.ego_proxy/calendar_key.bin`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_path: Option<PathBuf>,
}

impl StorageSettings {
    pub fn database_path(&self) -> ClientResult<PathBuf> {
        self.database_path
            .clone()
            .or_else(ego_proxy_store::default_database_path)
            .ok_or_else(|| no_home("storage.database_path"))
    }

    pub fn key_path(&self) -> ClientResult<PathBuf> {
        self.key_path
            .clone()
            .or_else(ego_proxy_store::default_key_path)
            .ok_or_else(|| no_home("storage.key_path"))
    }

    /// Opens the credential store, creating the key and database if needed.
    pub fn open_store(&self) -> ClientResult<Arc<CredentialStore>> {
        let database_path = self.database_path()?;
        let key_path = self.key_path()?;
        debug!(
            "opening credential store {} (key {})",
            database_path.display(),
            key_path.display()
        );
        Ok(Arc::new(CredentialStore::open(database_path, key_path)?))
    }
}

fn no_home(key: &str) -> ClientError {
    ClientError::Config(format!(
        "cannot determine the home directory; set {} in the configuration file",
        key
    ))
}

/// OpenAI-compatible language model used for event and metadata extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Without a model the heuristics are used.
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    /// Plain text, `env::VAR` or `pass::path`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: LlmConfig::DEFAULT_BASE_URL.to_string(),
            model: LlmConfig::DEFAULT_MODEL.to_string(),
            api_key: None,
            timeout_secs: LlmConfig::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl LlmSettings {
    /// Returns the client configuration, or `None` when disabled.
    pub fn to_llm_config(&self) -> ClientResult<Option<LlmConfig>> {
        if !self.enabled {
            return Ok(None);
        }

        let mut config = LlmConfig::new(&self.base_url, &self.model)?
            .with_timeout(Duration::from_secs(self.timeout_secs));

        if let Some(raw) = &self.api_key {
            let key = crate::secret::resolve(raw)
                .map_err(|e| ClientError::Config(format!("failed to resolve llm.api_key: {}", e)))?;
            config = config.with_api_key(key);
        }

        Ok(Some(config))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantSettings {
    /// Length of events whose request names no duration.
    pub default_duration_hours: f64,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            default_duration_hours: 1.0,
        }
    }
}

impl ClientConfig {
    /// Loads the configuration.
    ///
    /// An explicit path must exist; a missing default file yields the
    /// defaults.
    pub fn load(path: Option<&Path>) -> ClientResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    debug!("no configuration file at {}", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            ClientError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        ego_proxy_store::data_dir()
            .unwrap_or_else(|| PathBuf::from(ego_proxy_store::DATA_DIR_NAME))
            .join(CONFIG_FILE_NAME)
    }

    /// Checks values that parse but cannot work.
    pub fn validate(&self) -> Result<(), String> {
        if self.google.calendar_id.trim().is_empty() {
            return Err("google.calendar_id must not be empty".to_string());
        }
        if self.google.account.trim().is_empty() {
            return Err("google.account must not be empty".to_string());
        }
        let (first, last) = self.google.loopback_port_range;
        if first > last {
            return Err(format!(
                "google.loopback_port_range is empty: {} > {}",
                first, last
            ));
        }
        if self.google.timeout_secs == 0 {
            return Err("google.timeout_secs must be positive".to_string());
        }

        let hours = self.assistant.default_duration_hours;
        if !(hours > 0.0 && hours <= 24.0) {
            return Err(format!(
                "assistant.default_duration_hours must be in (0, 24], got {}",
                hours
            ));
        }

        if self.llm.enabled {
            LlmConfig::new(&self.llm.base_url, &self.llm.model)
                .map_err(|e| format!("llm: {}", e.message()))?;
        }

        Ok(())
    }

    /// Serializes the configuration with inline secrets masked.
    pub fn to_redacted_toml(&self) -> ClientResult<String> {
        let mut shown = self.clone();
        shown.llm.api_key = shown.llm.api_key.as_deref().map(crate::secret::redact);
        toml::to_string_pretty(&shown)
            .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))
    }
}

/// Writes `google.credentials_path` into the configuration file, keeping
/// everything else (comments included) as it is.
pub fn persist_credentials_path(config_path: &Path, credentials_path: &Path) -> ClientResult<()> {
    let content = match std::fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let mut doc = content.parse::<toml_edit::DocumentMut>().map_err(|e| {
        ClientError::Config(format!(
            "could not parse {} for writing: {}",
            config_path.display(),
            e
        ))
    })?;

    if !doc.contains_table("google") {
        doc["google"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    let absolute = std::path::absolute(credentials_path)?;
    doc["google"]["credentials_path"] = toml_edit::value(absolute.display().to_string());

    if let Some(parent) = config_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(config_path, doc.to_string())?;

    info!("saved credentials path to {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_file() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.google.calendar_id, "primary");
        assert_eq!(config.google.account, "default");
        assert_eq!(config.google.loopback_port_range, (8080, 8090));
        assert!(!config.llm.enabled);
        assert_eq!(config.assistant.default_duration_hours, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_sections() {
        let config: ClientConfig = toml::from_str(
            r#"
[google]
calendar_id = "team@example.com"
loopback_port_range = [9000, 9005]

[llm]
enabled = true
model = "qwen2.5"
api_key = "env::LLM_KEY"
"#,
        )
        .unwrap();

        assert_eq!(config.google.calendar_id, "team@example.com");
        assert_eq!(config.google.account, "default");
        assert_eq!(config.google.loopback_port_range, (9000, 9005));
        assert_eq!(config.llm.model, "qwen2.5");
        assert_eq!(config.llm.base_url, LlmConfig::DEFAULT_BASE_URL);
        assert_eq!(config.storage, StorageSettings::default());
    }

    #[test]
    fn validation_errors() {
        let mut config = ClientConfig::default();
        config.google.loopback_port_range = (9000, 8000);
        assert!(config.validate().unwrap_err().contains("loopback_port_range"));

        let mut config = ClientConfig::default();
        config.assistant.default_duration_hours = 0.0;
        assert!(config.validate().unwrap_err().contains("default_duration_hours"));

        let mut config = ClientConfig::default();
        config.llm.enabled = true;
        config.llm.base_url = "localhost".to_string();
        assert!(config.validate().unwrap_err().starts_with("llm:"));
    }

    #[test]
    fn llm_config_only_when_enabled() {
        let mut settings = LlmSettings::default();
        assert!(settings.to_llm_config().unwrap().is_none());

        settings.enabled = true;
        settings.api_key = Some("sk-inline".to_string());
        let config = settings.to_llm_config().unwrap().unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-inline"));
        assert_eq!(config.model, LlmConfig::DEFAULT_MODEL);

        settings.api_key = Some("env::_EGO_PROXY_UNSET_KEY_98765".to_string());
        assert!(matches!(
            settings.to_llm_config(),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn redacted_dump_hides_inline_key() {
        let mut config = ClientConfig::default();
        config.llm.api_key = Some("sk-secret".to_string());
        let dumped = config.to_redacted_toml().unwrap();
        assert!(!dumped.contains("sk-secret"));
        assert!(dumped.contains("<redacted>"));
        assert!(dumped.contains("calendar_id = \"primary\""));
    }

    #[test]
    fn storage_paths_override_defaults() {
        let storage = StorageSettings {
            database_path: Some(PathBuf::from("/data/db.sqlite")),
            key_path: Some(PathBuf::from("/data/key.bin")),
        };
        assert_eq!(storage.database_path().unwrap(), PathBuf::from("/data/db.sqlite"));
        assert_eq!(storage.key_path().unwrap(), PathBuf::from("/data/key.bin"));
    }

    #[test]
    fn open_store_in_configured_location() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = StorageSettings {
            database_path: Some(tmp.path().join("memory.db")),
            key_path: Some(tmp.path().join("keys").join("calendar_key.bin")),
        };
        let store = storage.open_store().unwrap();
        assert!(store.accounts().unwrap().is_empty());
        assert!(tmp.path().join("keys").join("calendar_key.bin").exists());
    }

    #[test]
    fn explicit_missing_config_is_error() {
        let err = ClientConfig::load(Some(Path::new("/nonexistent/ego-proxy.toml"))).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn provider_config_from_credentials_file() {
        let tmp = tempfile::tempdir().unwrap();
        let creds = tmp.path().join("credentials.json");
        std::fs::write(
            &creds,
            r#"{"installed": {"client_id": "id.apps.googleusercontent.com", "client_secret": "s"}}"#,
        )
        .unwrap();

        let settings = GoogleSettings {
            credentials_path: Some(creds),
            calendar_id: "work@example.com".to_string(),
            account: "work".to_string(),
            ..Default::default()
        };
        let config = settings.to_provider_config(None).unwrap();
        assert_eq!(config.credentials.client_id, "id.apps.googleusercontent.com");
        assert_eq!(config.calendar_id, "work@example.com");
        assert_eq!(config.provider_name(), "google:work");

        let err = settings
            .to_provider_config(Some(Path::new("/nonexistent/credentials.json")))
            .unwrap_err();
        assert!(err.to_string().contains("credentials file not found"));
    }

    #[test]
    fn persist_credentials_path_keeps_existing_content() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            "# my settings\n[google]\ncalendar_id = \"team@example.com\"\n\n[llm]\nenabled = true\n",
        )
        .unwrap();
        let creds = tmp.path().join("credentials.json");

        persist_credentials_path(&config_path, &creds).unwrap();

        let content = std::fs::read_to_string(&config_path).unwrap();
        assert!(content.starts_with("# my settings"));
        let reloaded = ClientConfig::load_from(&config_path).unwrap();
        assert_eq!(reloaded.google.credentials_path, Some(creds));
        assert_eq!(reloaded.google.calendar_id, "team@example.com");
        assert!(reloaded.llm.enabled);
    }

    #[test]
    fn persist_credentials_path_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("nested").join("config.toml");
        let creds = tmp.path().join("credentials.json");

        persist_credentials_path(&config_path, &creds).unwrap();

        let reloaded = ClientConfig::load_from(&config_path).unwrap();
        assert_eq!(reloaded.google.credentials_path, Some(creds));
    }
}
