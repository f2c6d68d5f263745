//! Configuration commands.

use std::path::Path;

use ego_proxy_providers::google::{GoogleConfig, OAuthCredentials};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout. Inline API keys are masked.
pub fn dump(config: &ClientConfig, config_path: &Path) -> ClientResult<()> {
    println!("# config.toml ({})", config_path.display());
    println!("{}", config.to_redacted_toml()?);
    Ok(())
}

/// Validate the configuration.
///
/// Also checks that the Google credentials file can be found and parsed,
/// and that a configured LLM API key resolves.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    config.validate().map_err(ClientError::Config)?;

    match GoogleConfig::resolve_credentials_path(None, config.google.credentials_path.as_deref()) {
        Ok(path) => {
            let credentials = OAuthCredentials::from_file(&path)?;
            credentials.validate().map_err(|e| {
                ClientError::Config(format!("invalid credentials in {}: {}", path.display(), e))
            })?;
            println!("Google credentials: {}", path.display());
        }
        Err(e) => println!("Google credentials: not found ({})", e.message()),
    }

    if config.llm.to_llm_config()?.is_some() {
        println!("Language model: {} at {}", config.llm.model, config.llm.base_url);
    }

    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path(config_path: &Path) -> ClientResult<()> {
    let state = if config_path.exists() { "" } else { " (not created)" };
    println!("config: {}{}", config_path.display(), state);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_reports_bad_values() {
        let mut config = ClientConfig::default();
        config.google.calendar_id = " ".to_string();
        assert!(matches!(validate(&config), Err(ClientError::Config(_))));
    }

    #[test]
    fn validate_checks_credentials_file() {
        let tmp = tempfile::tempdir().unwrap();
        let creds = tmp.path().join("credentials.json");
        std::fs::write(&creds, r#"{"installed": {"client_id": "bad", "client_secret": "s"}}"#)
            .unwrap();

        let mut config = ClientConfig::default();
        config.google.credentials_path = Some(creds);
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("apps.googleusercontent.com"));
    }

    #[test]
    fn dump_and_path() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        dump(&ClientConfig::default(), &config_path).unwrap();
        path(&config_path).unwrap();
    }
}
