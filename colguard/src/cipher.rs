//! Cell encryption and decryption.
//!
//! Each protected cell is encrypted on its own with the key issued for its
//! column, using ChaCha20-Poly1305 with the [`CellContext`] as associated
//! data. The result is wrapped in a [`CellEnvelope`] for storage.

use crate::agent::Key;
use crate::context::CellContext;
use crate::error::Error;
use crate::header::CellEnvelope;
use chacha20poly1305::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng, Payload},
    ChaCha20Poly1305, Nonce,
};
use secrecy::SecretVec;
use std::collections::HashMap;
use tracing::debug;

/// Placeholder shown for any cell the caller may not read.
pub const RESTRICTED: &str = "RESTRICTED";

/// Key material size in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Nonce size for ChaCha20-Poly1305 (96 bits).
const NONCE_SIZE: usize = 12;

/// Generates random key material.
///
/// # Example
///
/// ```
/// use colguard::cipher::{generate_key, KEY_SIZE};
/// use secrecy::ExposeSecret;
///
/// let key = generate_key();
/// assert_eq!(key.expose_secret().len(), KEY_SIZE);
/// ```
#[must_use]
pub fn generate_key() -> SecretVec<u8> {
    let mut material = vec![0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut material);
    SecretVec::new(material)
}

/// Encrypts a plaintext cell under `key`.
///
/// # Errors
///
/// Returns `Error::EncryptionFailed` if the key material is unusable, or
/// `Error::InvalidEnvelope` if the key id cannot be carried in an envelope.
pub fn encrypt_cell(key: &Key, plaintext: &str, context: &CellContext) -> Result<String, Error> {
    let cipher = ChaCha20Poly1305::new_from_slice(key.material())
        .map_err(|e| Error::EncryptionFailed(format!("Invalid key material: {e}")))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from(nonce_bytes);

    let aad = context.to_string();
    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext.as_bytes(), aad: aad.as_bytes() })
        .map_err(|e| Error::EncryptionFailed(format!("ChaCha20-Poly1305 encryption failed: {e}")))?;

    let mut payload = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    payload.extend_from_slice(&nonce_bytes);
    payload.extend_from_slice(&ciphertext);

    Ok(CellEnvelope::new(key.id(), payload)?.to_string())
}

/// Decrypts an envelope with `key`.
///
/// # Errors
///
/// Returns `Error::DecryptionFailed` if the key does not match the envelope
/// or the payload is truncated, and `Error::AuthenticationFailed` if the tag
/// does not verify (wrong context or tampered data).
pub fn decrypt_cell(
    key: &Key,
    envelope: &CellEnvelope,
    context: &CellContext,
) -> Result<String, Error> {
    if key.id() != envelope.key_id() {
        return Err(Error::DecryptionFailed(format!(
            "envelope needs key {}, got {}",
            envelope.key_id(),
            key.id()
        )));
    }

    let cipher = ChaCha20Poly1305::new_from_slice(key.material())
        .map_err(|e| Error::DecryptionFailed(format!("Invalid key material: {e}")))?;

    if envelope.payload().len() < NONCE_SIZE {
        return Err(Error::DecryptionFailed("payload shorter than nonce".to_string()));
    }
    let (nonce_bytes, ciphertext) = envelope.payload().split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    let aad = context.to_string();
    let plaintext = cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad: aad.as_bytes() })
        .map_err(|_| Error::AuthenticationFailed)?;

    String::from_utf8(plaintext)
        .map_err(|e| Error::DecryptionFailed(format!("plaintext is not UTF-8: {e}")))
}

/// The keys a caller was granted, indexed by id and by column.
#[derive(Debug, Default)]
pub struct Keyring {
    keys: Vec<Key>,
    by_id: HashMap<String, usize>,
}

impl Keyring {
    #[must_use]
    pub fn new(keys: Vec<Key>) -> Self {
        let by_id = keys.iter().enumerate().map(|(i, key)| (key.id().to_string(), i)).collect();
        Self { keys, by_id }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Key> {
        self.by_id.get(id).and_then(|&i| self.keys.get(i))
    }

    /// Returns the key tagged for `column`, if one was granted.
    #[must_use]
    pub fn for_column(&self, column: &str) -> Option<&Key> {
        self.keys.iter().find(|key| key.column_name() == Some(column))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter()
    }
}

/// Decodes cells read back from the database.
///
/// Plain values pass through, so query-level placeholders survive. Envelopes
/// are decrypted when their key is in the keyring; any other envelope is
/// masked as [`RESTRICTED`].
#[derive(Debug)]
pub struct RowDecoder<'a> {
    keyring: &'a Keyring,
}

impl<'a> RowDecoder<'a> {
    #[must_use]
    pub const fn new(keyring: &'a Keyring) -> Self {
        Self { keyring }
    }

    /// Decodes one cell. `NULL` renders as an empty string.
    #[must_use]
    pub fn decode_cell(&self, value: Option<&str>, context: &CellContext) -> String {
        let Some(value) = value else {
            return String::new();
        };
        if !CellEnvelope::is_envelope(value) {
            return value.to_string();
        }

        let envelope = match CellEnvelope::parse(value) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("{context}: {e}");
                return RESTRICTED.to_string();
            }
        };
        let Some(key) = self.keyring.get(envelope.key_id()) else {
            debug!("{context}: key {} not granted", envelope.key_id());
            return RESTRICTED.to_string();
        };
        decrypt_cell(key, &envelope, context).unwrap_or_else(|e| {
            debug!("{context}: {e}");
            RESTRICTED.to_string()
        })
    }

    /// Decodes a row against the given per-cell contexts.
    #[must_use]
    pub fn decode_row(&self, row: &[Option<String>], contexts: &[CellContext]) -> Vec<String> {
        row.iter()
            .zip(contexts)
            .map(|(value, context)| self.decode_cell(value.as_deref(), context))
            .collect()
    }
}
