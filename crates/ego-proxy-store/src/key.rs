//! The symmetric key file.
//!
//! The key is 32 random bytes stored as-is. The file is created on first use
//! with owner-only permissions; its directory is created `0700` on Unix.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, info};

use crate::error::{Result, StoreError};

/// Length of the key in bytes.
pub const KEY_LEN: usize = 32;

/// A loaded encryption key together with the file it came from.
pub struct KeyFile {
    path: PathBuf,
    key: [u8; KEY_LEN],
}

impl KeyFile {
    /// Loads the key at `path`, generating and writing a new one if the file
    /// does not exist.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }

        ensure_private_dir(path)?;

        let mut key = [0u8; KEY_LEN];
        rand::rng().fill(&mut key[..]);
        write_private(path, &key)?;
        info!("generated new encryption key at {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            key,
        })
    }

    /// Loads an existing key file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
        let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| StoreError::InvalidKey {
            path: path.to_path_buf(),
            len: bytes.len(),
        })?;
        debug!("loaded encryption key from {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            key,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

impl fmt::Debug for KeyFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyFile")
            .field("path", &self.path)
            .field("key", &"[redacted]")
            .finish()
    }
}

fn ensure_private_dir(path: &Path) -> Result<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if parent.exists() {
        return Ok(());
    }

    fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
            .map_err(|e| StoreError::io(parent, e))?;
    }
    Ok(())
}

fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(|e| StoreError::io(path, e))?;
    file.write_all(bytes).map_err(|e| StoreError::io(path, e))?;
    file.sync_all().map_err(|e| StoreError::io(path, e))
}
