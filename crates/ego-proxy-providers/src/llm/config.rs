//! Chat-completions client configuration.

use std::time::Duration;

use url::Url;

use crate::error::{ProviderError, ProviderResult};

/// Configuration for an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct LlmConfig {
    /// API root, e.g. `http://localhost:11434/v1`.
    pub base_url: Url,
    pub model: String,
    /// Sent as a bearer token when set.
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl LlmConfig {
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:11434/v1";
    pub const DEFAULT_MODEL: &'static str = "llama3.2";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

    /// Parses and validates `base_url`; only http and https are accepted.
    pub fn new(base_url: &str, model: impl Into<String>) -> ProviderResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            ProviderError::configuration(format!("invalid LLM base URL '{}': {}", base_url, e))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ProviderError::configuration(format!(
                "unsupported LLM base URL scheme: {}",
                base_url.scheme()
            )));
        }

        let model = model.into();
        if model.trim().is_empty() {
            return Err(ProviderError::configuration("LLM model must not be empty"));
        }

        Ok(Self {
            base_url,
            model,
            api_key: None,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into()).filter(|k: &String| !k.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `<base_url>/chat/completions`, whether or not the base ends in `/`.
    pub fn endpoint(&self) -> ProviderResult<Url> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join("chat/completions").map_err(|e| {
            ProviderError::configuration(format!("invalid LLM endpoint: {}", e))
        })
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}
