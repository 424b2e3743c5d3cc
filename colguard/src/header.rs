//! Text envelope for encrypted cells.
//!
//! Encrypted cells are stored as printable text so they fit ordinary
//! `VARCHAR`/`TEXT` columns:
//!
//! ```text
//! ~!2!<key id>!<base64(nonce || ciphertext)>!
//! ```
//!
//! The key id travels with the value, so a reader can tell which key each
//! cell needs without consulting the access table.

use crate::error::Error;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Envelope prefix, carrying format version 2.
const PREFIX: &str = "~!2!";
const SEPARATOR: char = '!';

/// Parsed cell envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellEnvelope {
    key_id: String,
    payload: Vec<u8>,
}

impl CellEnvelope {
    /// Creates an envelope for `payload` (nonce followed by ciphertext).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidEnvelope` if the key id is empty or contains
    /// the `!` separator.
    pub fn new(key_id: impl Into<String>, payload: Vec<u8>) -> Result<Self, Error> {
        let key_id = key_id.into();
        if key_id.is_empty() || key_id.contains(SEPARATOR) {
            return Err(Error::InvalidEnvelope(format!("unusable key id: {key_id:?}")));
        }
        Ok(Self { key_id, payload })
    }

    /// Returns true if `value` carries the envelope prefix.
    ///
    /// Plain values, including the `RESTRICTED` placeholder, return false.
    #[must_use]
    pub fn is_envelope(value: &str) -> bool {
        value.starts_with(PREFIX)
    }

    /// Returns the key identifier.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Returns nonce and ciphertext.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Parses a stored cell value.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidEnvelope` if the prefix, key id, terminator or
    /// base64 payload is malformed.
    pub fn parse(value: &str) -> Result<Self, Error> {
        let rest = value
            .strip_prefix(PREFIX)
            .ok_or_else(|| Error::InvalidEnvelope("missing envelope prefix".to_string()))?;
        let body = rest
            .strip_suffix(SEPARATOR)
            .ok_or_else(|| Error::InvalidEnvelope("missing terminator".to_string()))?;
        let (key_id, encoded) = body
            .split_once(SEPARATOR)
            .ok_or_else(|| Error::InvalidEnvelope("missing key id".to_string()))?;
        let payload = STANDARD
            .decode(encoded)
            .map_err(|e| Error::InvalidEnvelope(format!("invalid payload: {e}")))?;
        Self::new(key_id, payload)
    }
}

impl std::fmt::Display for CellEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{PREFIX}{}{SEPARATOR}{}{SEPARATOR}", self.key_id, STANDARD.encode(&self.payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_format() {
        let envelope = CellEnvelope::new("D7GHabc", vec![1, 2, 3]).unwrap();
        assert_eq!(envelope.to_string(), "~!2!D7GHabc!AQID!");
    }

    #[test]
    fn test_envelope_parse() {
        let envelope = CellEnvelope::parse("~!2!D7GHabc!AQID!").unwrap();
        assert_eq!(envelope.key_id(), "D7GHabc");
        assert_eq!(envelope.payload(), &[1, 2, 3]);
    }

    #[test]
    fn test_plain_values_are_not_envelopes() {
        assert!(!CellEnvelope::is_envelope("RESTRICTED"));
        assert!(!CellEnvelope::is_envelope("Ann"));
        assert!(CellEnvelope::is_envelope("~!2!K!AA==!"));
    }

    #[test]
    fn test_envelope_missing_terminator() {
        let result = CellEnvelope::parse("~!2!K!AQID");
        assert!(matches!(result, Err(Error::InvalidEnvelope(_))));
    }

    #[test]
    fn test_envelope_missing_key_id() {
        let result = CellEnvelope::parse("~!2!AQID!");
        assert!(matches!(result, Err(Error::InvalidEnvelope(_))));
    }

    #[test]
    fn test_envelope_bad_base64() {
        let result = CellEnvelope::parse("~!2!K!not base64!");
        assert!(matches!(result, Err(Error::InvalidEnvelope(_))));
    }

    #[test]
    fn test_envelope_rejects_separator_in_key_id() {
        let result = CellEnvelope::new("a!b", vec![0]);
        assert!(matches!(result, Err(Error::InvalidEnvelope(_))));
    }
}
