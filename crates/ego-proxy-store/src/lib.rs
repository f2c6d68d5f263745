//! Encrypted credential storage
//!
//! OAuth tokens are kept in the `calendar_credentials` table of a local
//! SQLite database. Rows hold XChaCha20-Poly1305 ciphertext; the key lives
//! in a separate file readable only by the owner.

pub mod db;
pub mod error;
pub mod key;
pub mod store;
pub mod vault;

use std::path::PathBuf;

pub use db::{CredentialDb, CredentialRecord};
pub use error::{Result, StoreError};
pub use key::{KEY_LEN, KeyFile};
pub use store::CredentialStore;
pub use vault::Vault;

/// Name of the per-user data directory under `$HOME`.
pub const DATA_DIR_NAME: &str = ".ego_proxy";
pub const DEFAULT_DATABASE_FILE: &str = "assistant_memory.db";
pub const DEFAULT_KEY_FILE: &str = "calendar_key.bin";

/// `~/.ego_proxy`, or `None` when the home directory is unknown.
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DATA_DIR_NAME))
}

pub fn default_database_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join(DEFAULT_DATABASE_FILE))
}

pub fn default_key_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join(DEFAULT_KEY_FILE))
}
