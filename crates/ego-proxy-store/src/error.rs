//! Error types for credential storage.

use std::path::PathBuf;

use thiserror::Error;

use crate::key::KEY_LEN;

/// Errors from the key file, the vault or the credential database.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid key file {}: expected {} bytes, found {len}", path.display(), KEY_LEN)]
    InvalidKey { path: PathBuf, len: usize },

    #[error("could not encrypt credentials for '{account}'")]
    Encrypt { account: String },

    /// The blob does not open with the current key, usually because the key
    /// file was replaced or removed.
    #[error(
        "could not decrypt credentials for '{account}' (was the key file replaced?); \
         run 'ego-proxy auth revoke' and authenticate again"
    )]
    Decrypt { account: String },

    #[error("corrupt credential blob: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrypt_error_mentions_revoke() {
        let err = StoreError::Decrypt {
            account: "default".into(),
        };
        let message = err.to_string();
        assert!(message.contains("'default'"));
        assert!(message.contains("ego-proxy auth revoke"));
    }

    #[test]
    fn invalid_key_display() {
        let err = StoreError::InvalidKey {
            path: PathBuf::from("/tmp/key.bin"),
            len: 12,
        };
        assert_eq!(
            err.to_string(),
            "invalid key file /tmp/key.bin: expected 32 bytes, found 12"
        );
    }
}
