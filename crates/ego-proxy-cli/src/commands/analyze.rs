//! Message metadata extraction.

use ego_proxy_core::{ChatRole, MessageMetadata, MetadataExtractor, extract_simple};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Print the metadata of `message` as JSON.
///
/// Uses the configured language model unless `simple` is set or `[llm]`
/// is disabled.
pub async fn analyze(config: &ClientConfig, message: &str, simple: bool) -> ClientResult<()> {
    let metadata = if simple {
        extract_simple(message)
    } else {
        match super::text_generator(config)? {
            Some(generator) => {
                MetadataExtractor::new(generator)
                    .extract(message, ChatRole::User)
                    .await
            }
            None => extract_simple(message),
        }
    };

    println!("{}", render(&metadata)?);
    Ok(())
}

fn render(metadata: &MessageMetadata) -> ClientResult<String> {
    serde_json::to_string_pretty(metadata)
        .map_err(|e| ClientError::Input(format!("failed to serialize metadata: {}", e)))
}
