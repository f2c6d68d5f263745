//! Google Calendar provider.
//!
//! # Authentication Flow
//!
//! 1. The user downloads a desktop-app `credentials.json` (Google requires
//!    registered OAuth clients)
//! 2. [`OAuthClient`] opens the consent page with a PKCE challenge and
//!    waits on a loopback port for the redirect
//! 3. The authorization code is exchanged for access and refresh tokens
//! 4. [`TokenStorage`] persists them encrypted in the credential store
//! 5. [`GoogleProvider`] refreshes the access token whenever it expires
//!
//! # Example
//!
//! ```ignore
//! use ego_proxy_providers::google::{GoogleConfig, GoogleProvider, OAuthCredentials};
//!
//! let path = GoogleConfig::resolve_credentials_path(None, None)?;
//! let config = GoogleConfig::new(OAuthCredentials::from_file(path)?);
//! let provider = GoogleProvider::new(config, store)?;
//!
//! if !provider.is_authenticated() {
//!     provider.authenticate().await?;
//! }
//! ```

mod client;
mod config;
mod oauth;
mod provider;
mod tokens;

pub use client::{CalendarListEntry, GoogleCalendarClient};
pub use config::{CREDENTIALS_ENV, CREDENTIALS_FILE_NAME, GoogleConfig, OAuthCredentials};
pub use oauth::{OAuthClient, PkceFlow};
pub use provider::GoogleProvider;
pub use tokens::{TokenInfo, TokenStorage};
