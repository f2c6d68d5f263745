//! OpenAI-compatible chat-completions client.

use ego_proxy_core::{BoxFuture, ChatMessage, GenerationOptions, GeneratorError, TextGenerator};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::{ProviderError, ProviderResult};

use super::config::LlmConfig;

/// Sends prompts to `<base_url>/chat/completions`.
#[derive(Debug)]
pub struct ChatCompletionsClient {
    http_client: reqwest::Client,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    name: String,
}

impl ChatCompletionsClient {
    pub fn new(config: LlmConfig) -> ProviderResult<Self> {
        let endpoint = config.endpoint()?;
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProviderError::internal(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            http_client,
            endpoint,
            name: format!("llm:{}", config.model),
            model: config.model,
            api_key: config.api_key,
        })
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: GenerationOptions,
    ) -> Result<String, GeneratorError> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": options.max_new_tokens,
            "temperature": options.temperature,
            "stream": false,
        });

        let mut request = self
            .http_client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string());
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        debug!("sending {} messages to {}", messages.len(), self.endpoint);
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GeneratorError::Request("request timeout".to_string())
            } else {
                GeneratorError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GeneratorError::Request(format!("failed to read response: {}", e)))?;

        match status {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                return Err(GeneratorError::Rejected(format!("HTTP {}: {}", status, text)));
            }
            _ => return Err(GeneratorError::Request(format!("HTTP {}: {}", status, text))),
        }

        let parsed: CompletionResponse = serde_json::from_str(&text)
            .map_err(|e| GeneratorError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GeneratorError::InvalidResponse("no choices in response".to_string()))
    }
}

impl TextGenerator for ChatCompletionsClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate_chat<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        options: GenerationOptions,
    ) -> BoxFuture<'a, Result<String, GeneratorError>> {
        Box::pin(self.complete(messages, options))
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
