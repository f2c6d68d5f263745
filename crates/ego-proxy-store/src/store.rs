//! Typed, encrypted credential storage.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::db::{CredentialDb, CredentialRecord};
use crate::error::Result;
use crate::key::KeyFile;
use crate::vault::Vault;

/// Serialises values to JSON, seals them with the [`Vault`] and keeps them
/// in the [`CredentialDb`], one row per account.
pub struct CredentialStore {
    db: CredentialDb,
    vault: Vault,
}

impl CredentialStore {
    /// Opens the database at `db_path`, creating the key at `key_path` if
    /// needed.
    pub fn open(db_path: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Result<Self> {
        let key = KeyFile::load_or_create(key_path)?;
        let db = CredentialDb::open(db_path)?;
        Ok(Self::new(db, Vault::new(&key)))
    }

    pub fn new(db: CredentialDb, vault: Vault) -> Self {
        Self { db, vault }
    }

    pub fn save<T: Serialize>(&self, account: &str, value: &T) -> Result<()> {
        let json = serde_json::to_vec(value)?;
        let blob = self.vault.seal(account, &json)?;
        self.db.put(account, &blob)
    }

    /// Loads the value for `account`, or `None` if nothing is stored.
    pub fn load<T: DeserializeOwned>(&self, account: &str) -> Result<Option<T>> {
        let Some(blob) = self.db.get(account)? else {
            debug!("no stored credentials for account '{}'", account);
            return Ok(None);
        };
        let json = self.vault.open(account, &blob)?;
        Ok(Some(serde_json::from_slice(&json)?))
    }

    pub fn remove(&self, account: &str) -> Result<bool> {
        self.db.delete(account)
    }

    pub fn clear(&self) -> Result<usize> {
        self.db.clear()
    }

    pub fn accounts(&self) -> Result<Vec<String>> {
        self.db.accounts()
    }

    pub fn record(&self, account: &str) -> Result<Option<CredentialRecord>> {
        self.db.record(account)
    }

    pub fn db(&self) -> &CredentialDb {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Token {
        access_token: String,
        refresh_token: Option<String>,
    }

    fn token() -> Token {
        Token {
            access_token: "ya29.abc".into(),
            refresh_token: Some("1//refresh".into()),
        }
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(
            dir.path().join("assistant_memory.db"),
            dir.path().join("calendar_key.bin"),
        )
        .unwrap();

        assert_eq!(store.load::<Token>("default").unwrap(), None);
        store.save("default", &token()).unwrap();
        assert_eq!(store.load::<Token>("default").unwrap(), Some(token()));
        assert_eq!(store.accounts().unwrap(), vec!["default"]);
        assert!(store.record("default").unwrap().is_some());
    }

    #[test]
    fn ciphertext_at_rest() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(
            dir.path().join("assistant_memory.db"),
            dir.path().join("calendar_key.bin"),
        )
        .unwrap();
        store.save("default", &token()).unwrap();

        let blob = store.db().get("default").unwrap().unwrap();
        let needle = b"ya29.abc";
        assert!(!blob.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn replaced_key_reports_decrypt() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("assistant_memory.db");
        let key_path = dir.path().join("calendar_key.bin");

        {
            let store = CredentialStore::open(&db_path, &key_path).unwrap();
            store.save("default", &token()).unwrap();
        }
        std::fs::remove_file(&key_path).unwrap();

        let store = CredentialStore::open(&db_path, &key_path).unwrap();
        match store.load::<Token>("default") {
            Err(err @ StoreError::Decrypt { .. }) => {
                assert!(err.to_string().contains("auth revoke"));
            }
            other => panic!("expected Decrypt, got {other:?}"),
        }

        assert!(store.remove("default").unwrap());
        assert_eq!(store.load::<Token>("default").unwrap(), None);
    }
}
