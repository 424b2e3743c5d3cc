//! Key agent abstraction for the external key-management system.
//!
//! The agent issues keys, tags them with attributes, and decides which keys a
//! caller may fetch. This crate only consumes that contract; policy
//! evaluation happens behind it.

use crate::error::AgentError;
use secrecy::{ExposeSecret, SecretVec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute naming the protected column a key belongs to.
pub const COLUMN_NAME_ATTRIBUTE: &str = "column_name";

/// Free-form attribute map attached to a key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyAttributes(BTreeMap<String, Vec<String>>);

impl KeyAttributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute with a single value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), vec![value.into()]);
        self
    }

    /// Returns all values of an attribute.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0.get(name).map(Vec::as_slice)
    }

    /// Returns the first value of an attribute.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|values| values.first()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

/// Request for one new key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateKeyRequest {
    /// Caller-side reference, echoed back for correlation
    pub key_ref: String,
    pub attributes: KeyAttributes,
}

impl CreateKeyRequest {
    #[must_use]
    pub fn new(key_ref: impl Into<String>, attributes: KeyAttributes) -> Self {
        Self { key_ref: key_ref.into(), attributes }
    }
}

/// A key issued by the agent: identifier, attributes and key material.
pub struct Key {
    id: String,
    attributes: KeyAttributes,
    material: SecretVec<u8>,
}

impl Key {
    #[must_use]
    pub fn new(id: impl Into<String>, attributes: KeyAttributes, material: SecretVec<u8>) -> Self {
        Self { id: id.into(), attributes, material }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn attributes(&self) -> &KeyAttributes {
        &self.attributes
    }

    /// Column this key protects, from the `column_name` attribute.
    #[must_use]
    pub fn column_name(&self) -> Option<&str> {
        self.attributes.first(COLUMN_NAME_ATTRIBUTE)
    }

    pub(crate) fn material(&self) -> &[u8] {
        self.material.expose_secret()
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("id", &self.id)
            .field("attributes", &self.attributes)
            .field("material", &"[REDACTED]")
            .finish()
    }
}

/// Client side of the key-management system.
///
/// `get_keys` returns only the keys the caller is allowed to use; denied or
/// unknown identifiers are left out of the response rather than reported as
/// errors. Callers compare the response length to the request.
#[async_trait::async_trait]
pub trait KeyAgent: Send + Sync {
    /// Creates one key per request, in request order.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::CreationFailed` if the agent refuses any key.
    async fn create_keys(&self, requests: &[CreateKeyRequest]) -> Result<Vec<Key>, AgentError>;

    /// Fetches the accessible subset of the given key identifiers.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::RequestFailed` if the request itself fails.
    async fn get_keys(&self, ids: &[String]) -> Result<Vec<Key>, AgentError>;
}
