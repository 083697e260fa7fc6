//! Encrypted key-value store wrapper.
//!
//! This module provides a store that wraps any other [`KeyValueStore`]
//! and seals every value with AES-256-GCM before it reaches the inner
//! store. It is meant for secrets (auth tokens, refresh tokens) that must
//! be persisted next to the rest of the offline state.
//!
//! ## Security Model
//!
//! - Each value is sealed independently with a fresh random nonce
//! - Stored form: base64 of `nonce (12 bytes) || ciphertext || tag (16 bytes)`
//! - The key name is bound as associated data, so a sealed value copied
//!   under another key fails authentication
//! - Keys are never stored; they must be provided by the application

use crate::error::{StorageError, StorageResult};
use crate::store::KeyValueStore;
use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Encryption key for the encrypted store.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(StorageError::Encryption(format!(
                "invalid key size: expected {KEY_SIZE}, got {}",
                bytes.len()
            )));
        }
        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Generates a random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Returns the key as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A key-value store that encrypts values on their way to an inner store.
///
/// # Example
///
/// ```rust
/// use tether_storage::{EncryptedStore, EncryptionKey, InMemoryStore, KeyValueStore};
///
/// # async fn demo() -> tether_storage::StorageResult<()> {
/// let store = EncryptedStore::new(InMemoryStore::new(), EncryptionKey::generate());
/// store.set("refresh_token", "secret").await?;
/// assert_eq!(store.get("refresh_token").await?.as_deref(), Some("secret"));
/// # Ok(())
/// # }
/// ```
pub struct EncryptedStore<S: KeyValueStore> {
    inner: S,
    cipher: Aes256Gcm,
}

impl<S: KeyValueStore> EncryptedStore<S> {
    /// Creates a new encrypted store wrapping `inner`.
    pub fn new(inner: S, key: EncryptionKey) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        Self { inner, cipher }
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn seal(&self, key: &str, plaintext: &str) -> StorageResult<String> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: key.as_bytes(),
                },
            )
            .map_err(|_| StorageError::Encryption("encryption failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    fn open(&self, key: &str, stored: &str) -> StorageResult<String> {
        let sealed = STANDARD
            .decode(stored)
            .map_err(|e| StorageError::Encryption(format!("invalid encoding: {e}")))?;
        if sealed.len() < NONCE_SIZE {
            return Err(StorageError::Encryption("ciphertext too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad: key.as_bytes(),
                },
            )
            .map_err(|_| StorageError::Encryption("authentication failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| StorageError::Corrupted(format!("value for {key:?} is not UTF-8")))
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for EncryptedStore<S> {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match self.inner.get(key).await? {
            Some(stored) => self.open(key, &stored).map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let sealed = self.seal(key, value)?;
        self.inner.set(key, &sealed).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        self.inner.keys().await
    }
}
