//! The `calendar_credentials` table.
//!
//! One row per account holding the sealed token blob. The connection is
//! shared behind a mutex; every operation is a single short statement.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS calendar_credentials (
    account TEXT PRIMARY KEY,
    encrypted_token BLOB NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Timestamps of a stored credential row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialRecord {
    pub account: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct CredentialDb {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl CredentialDb {
    /// Opens (or creates) the database file and its schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        info!("opening credential database at {}", path.display());
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Self::init(conn, Some(path.to_path_buf()))
    }

    /// An in-memory database, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or replaces the blob for `account`, keeping `created_at`.
    pub fn put(&self, account: &str, blob: &[u8]) -> Result<()> {
        let now = Utc::now();
        self.conn().execute(
            "INSERT INTO calendar_credentials (account, encrypted_token, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(account) DO UPDATE SET
                 encrypted_token = excluded.encrypted_token,
                 updated_at = excluded.updated_at",
            params![account, blob, now],
        )?;
        debug!("stored credentials for account '{}'", account);
        Ok(())
    }

    pub fn get(&self, account: &str) -> Result<Option<Vec<u8>>> {
        let blob = self
            .conn()
            .query_row(
                "SELECT encrypted_token FROM calendar_credentials WHERE account = ?1",
                params![account],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blob)
    }

    /// Deletes the row for `account`. Returns false if there was none.
    pub fn delete(&self, account: &str) -> Result<bool> {
        let deleted = self.conn().execute(
            "DELETE FROM calendar_credentials WHERE account = ?1",
            params![account],
        )?;
        Ok(deleted > 0)
    }

    /// Deletes every row. Returns the number of rows removed.
    pub fn clear(&self) -> Result<usize> {
        Ok(self.conn().execute("DELETE FROM calendar_credentials", [])?)
    }

    pub fn accounts(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT account FROM calendar_credentials ORDER BY account")?;
        let accounts = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(accounts)
    }

    pub fn record(&self, account: &str) -> Result<Option<CredentialRecord>> {
        let record = self
            .conn()
            .query_row(
                "SELECT account, created_at, updated_at FROM calendar_credentials WHERE account = ?1",
                params![account],
                |row| {
                    Ok(CredentialRecord {
                        account: row.get(0)?,
                        created_at: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}
