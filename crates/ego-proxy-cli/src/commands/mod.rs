//! Command implementations.

pub mod analyze;
pub mod auth;
pub mod calendar;
pub mod config;
pub mod parse_date;

use std::path::Path;
use std::sync::Arc;

use ego_proxy_core::TextGenerator;
use ego_proxy_providers::google::GoogleProvider;
use ego_proxy_providers::llm::ChatCompletionsClient;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Builds the language-model client, or `None` when `[llm]` is disabled.
pub(crate) fn text_generator(config: &ClientConfig) -> ClientResult<Option<Arc<dyn TextGenerator>>> {
    let Some(llm_config) = config.llm.to_llm_config()? else {
        debug!("language model disabled, using heuristics");
        return Ok(None);
    };
    debug!("using language model {} at {}", llm_config.model, llm_config.base_url);
    let client = ChatCompletionsClient::new(llm_config)?;
    Ok(Some(Arc::new(client)))
}

/// Opens the credential store and builds the Google provider for the
/// configured account.
pub(crate) fn google_provider(
    config: &ClientConfig,
    credentials_file: Option<&Path>,
) -> ClientResult<GoogleProvider> {
    let google_config = config.google.to_provider_config(credentials_file)?;
    let store = config.storage.open_store()?;
    Ok(GoogleProvider::new(google_config, store)?)
}

/// IANA name of the local time zone, from `$TZ`.
pub(crate) fn local_time_zone() -> Option<String> {
    iana_zone(&std::env::var("TZ").ok()?)
}

/// `raw` as an IANA zone name. POSIX rules (`CET-1CEST,...`) and file
/// paths give `None`.
fn iana_zone(raw: &str) -> Option<String> {
    let name = raw.trim().trim_start_matches(':');
    name.parse::<chrono_tz::Tz>().ok().map(|tz| tz.name().to_string())
}
