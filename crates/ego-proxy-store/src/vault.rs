//! Authenticated encryption of credential blobs.
//!
//! Blob layout: `version (1 byte) || nonce (24 bytes) || ciphertext+tag`.
//! XChaCha20-Poly1305 with a random nonce per blob; the account name is
//! bound as associated data so a blob only opens under the row it was
//! written for.

use chacha20poly1305::aead::{Aead, Payload};
use chacha20poly1305::{Key, KeyInit, XChaCha20Poly1305, XNonce};
use rand::Rng;

use crate::error::{Result, StoreError};
use crate::key::KeyFile;

const VERSION: u8 = 1;
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + NONCE_LEN;

pub struct Vault {
    cipher: XChaCha20Poly1305,
}

impl Vault {
    pub fn new(key: &KeyFile) -> Self {
        Self::from_key_bytes(key.bytes())
    }

    pub(crate) fn from_key_bytes(key: &[u8; crate::key::KEY_LEN]) -> Self {
        Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    /// Encrypts `plaintext` for `account`.
    pub fn seal(&self, account: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::rng().fill(&mut nonce[..]);

        let ciphertext = self
            .cipher
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: account.as_bytes(),
                },
            )
            .map_err(|_| StoreError::Encrypt {
                account: account.to_string(),
            })?;

        let mut blob = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        blob.push(VERSION);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypts a blob written by [`Vault::seal`] for the same account.
    pub fn open(&self, account: &str, blob: &[u8]) -> Result<Vec<u8>> {
        if blob.len() < HEADER_LEN + TAG_LEN {
            return Err(StoreError::Corrupt(format!(
                "blob is {} bytes, shorter than the {} byte minimum",
                blob.len(),
                HEADER_LEN + TAG_LEN
            )));
        }
        if blob[0] != VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported blob version {}",
                blob[0]
            )));
        }

        let (nonce, ciphertext) = blob[1..].split_at(NONCE_LEN);
        self.cipher
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: account.as_bytes(),
                },
            )
            .map_err(|_| StoreError::Decrypt {
                account: account.to_string(),
            })
    }
}
