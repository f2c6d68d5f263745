//! Authentication commands.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use ego_proxy_providers::google::TokenInfo;
use ego_proxy_providers::{CalendarProvider, ProviderStatus};
use ego_proxy_store::CredentialStore;
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, persist_credentials_path};
use crate::error::ClientResult;

/// Run the Google authentication flow.
///
/// With `--force` the stored row is deleted first, which also recovers from
/// tokens that can no longer be decrypted. A `--credentials-file` is saved
/// to the configuration file so later commands find it.
pub async fn google(
    config: &ClientConfig,
    config_path: &Path,
    credentials_file: Option<PathBuf>,
    force: bool,
) -> ClientResult<()> {
    let account = &config.google.account;

    if force {
        let store = config.storage.open_store()?;
        if store.remove(account)? {
            info!("removed stored tokens for account '{}'", account);
        }
    }

    let provider = super::google_provider(config, credentials_file.as_deref())?;

    if provider.is_authenticated() && !provider.needs_reauth() {
        println!("Already authenticated with Google Calendar (account '{}').", account);
        println!("Use --force to re-authenticate.");
        save_credentials_path(config_path, credentials_file.as_deref());
        return Ok(());
    }

    println!("Starting Google Calendar authentication...");
    println!();
    println!("A browser window will open for you to authorize access.");
    println!("If the browser doesn't open, copy the URL printed below.");
    println!();

    provider.authenticate().await?;
    save_credentials_path(config_path, credentials_file.as_deref());

    info!("Google authentication successful");
    println!();
    println!("Authentication successful!");
    println!("{}", describe_status(&provider.status().await, Utc::now()));

    Ok(())
}

fn save_credentials_path(config_path: &Path, credentials_file: Option<&Path>) {
    let Some(credentials_file) = credentials_file else {
        return;
    };
    match persist_credentials_path(config_path, credentials_file) {
        Ok(()) => println!("Credentials path saved to {}", config_path.display()),
        Err(e) => warn!(
            "could not save credentials path to {}: {}",
            config_path.display(),
            e
        ),
    }
}

/// Show the authentication state of every stored account.
///
/// The configured account is reported by its provider when the credentials
/// file can be found; other accounts, or a provider that cannot be built,
/// fall back to what the store holds.
pub async fn status(config: &ClientConfig) -> ClientResult<()> {
    let store = config.storage.open_store()?;
    let accounts = store.accounts()?;

    if accounts.is_empty() {
        println!("No stored credentials. Run 'ego-proxy auth google' to authenticate.");
        return Ok(());
    }

    let live = match super::google_provider(config, None) {
        Ok(provider) => Some(provider.status().await),
        Err(e) => {
            debug!("showing stored tokens only: {}", e);
            None
        }
    };

    let now = Utc::now();
    for account in accounts {
        let text = match &live {
            Some(status) if account == config.google.account => {
                describe_status(status, now) + &stored_at(&store, &account)
            }
            _ => account_status(&store, &account, now),
        };
        println!("{}", text);
    }
    Ok(())
}

/// Renew the access token of the configured account.
pub async fn refresh(config: &ClientConfig) -> ClientResult<()> {
    let provider = super::google_provider(config, None)?;
    provider.refresh_auth().await?;
    println!("Access token renewed.");
    println!("{}", describe_status(&provider.status().await, Utc::now()));
    Ok(())
}

fn account_status(store: &CredentialStore, account: &str, now: DateTime<Utc>) -> String {
    match store.load::<TokenInfo>(account) {
        Ok(Some(tokens)) => {
            describe_status(&stored_status(account, &tokens, now), now) + &stored_at(store, account)
        }
        Ok(None) => format!("google:{}: no tokens", account),
        Err(e) => format!(
            "google:{}: unreadable ({}); run 'ego-proxy auth google --force'",
            account, e
        ),
    }
}

fn stored_at(store: &CredentialStore, account: &str) -> String {
    match store.record(account) {
        Ok(Some(record)) => format!(
            "\n  stored:  {}",
            record.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ),
        _ => String::new(),
    }
}

/// Status of an account known only from its stored tokens.
fn stored_status(account: &str, tokens: &TokenInfo, now: DateTime<Utc>) -> ProviderStatus {
    let mut status = ProviderStatus::new(format!("google:{}", account));
    let expired = tokens.is_expired_at(now);
    status.is_authenticated = !expired || tokens.can_refresh();
    status.token_expires_at = tokens.expires_at;
    status.can_refresh = tokens.can_refresh();
    status.scopes = tokens.scopes.clone();
    if expired && !tokens.can_refresh() {
        status.error = Some("token expired and no refresh token".to_string());
    }
    status
}

/// Summary of a provider status relative to `now`.
pub fn describe_status(status: &ProviderStatus, now: DateTime<Utc>) -> String {
    let expiry = match status.token_expires_at {
        Some(at) if at > now => format!("valid for {} min", (at - now).num_minutes()),
        Some(_) => "expired".to_string(),
        None if status.is_authenticated => "no expiry".to_string(),
        None => "none".to_string(),
    };
    let refresh = if status.can_refresh { "yes" } else { "no" };
    let scopes = if status.scopes.is_empty() {
        "(none)".to_string()
    } else {
        status.scopes.join(" ")
    };

    let mut out = format!(
        "{}:\n  access:  {}\n  refresh: {}\n  scopes:  {}",
        status.provider_type, expiry, refresh, scopes
    );
    if let Some(at) = status.last_sync {
        out.push_str(&format!(
            "\n  synced:  {}",
            at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ));
    }
    if let Some(error) = &status.error {
        out.push_str(&format!("\n  problem: {}", error));
    }
    out
}

/// Delete stored tokens for the configured account, or every account.
pub fn revoke(config: &ClientConfig, all: bool) -> ClientResult<()> {
    let store = config.storage.open_store()?;

    if all {
        let removed = store.clear()?;
        println!("Removed credentials for {} account(s).", removed);
        return Ok(());
    }

    let account = &config.google.account;
    if store.remove(account)? {
        println!("Removed credentials for account '{}'.", account);
    } else {
        println!("No stored credentials for account '{}'.", account);
    }
    Ok(())
}
