//! Client error types.

use std::fmt;

use ego_proxy_providers::{ProviderError, ProviderErrorCode};
use ego_proxy_store::StoreError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors reported by the `ego-proxy` commands.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration or credentials file problem.
    Config(String),
    /// Calendar or language-model backend failure.
    Provider(String),
    /// Credential storage failure.
    Store(String),
    /// IO error.
    Io(std::io::Error),
    /// Authentication required or rejected.
    AuthRequired(String),
    /// The message could not be turned into an event.
    Intent(String),
    /// Input that could not be understood.
    Input(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Provider(msg) => write!(f, "provider error: {}", msg),
            Self::Store(msg) => write!(f, "credential store error: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::AuthRequired(msg) => write!(f, "authentication required: {}", msg),
            Self::Intent(msg) => write!(f, "no event created: {}", msg),
            Self::Input(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ProviderError> for ClientError {
    fn from(err: ProviderError) -> Self {
        match err.code() {
            ProviderErrorCode::AuthenticationFailed => Self::AuthRequired(err.message().to_string()),
            ProviderErrorCode::ConfigurationError => Self::Config(err.message().to_string()),
            ProviderErrorCode::StorageError => Self::Store(err.message().to_string()),
            _ => Self::Provider(err.to_string()),
        }
    }
}

impl From<StoreError> for ClientError {
    fn from(err: StoreError) -> Self {
        Self::Store(err.to_string())
    }
}
