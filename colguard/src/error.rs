//! Error types for `colguard` operations.

use std::fmt;
use std::path::PathBuf;

/// Main error type for `colguard` operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be loaded or is incomplete
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection or statement failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Key agent operation failed
    #[error("key agent error: {0}")]
    Agent(#[from] AgentError),

    /// Cell encryption failed
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Cell decryption failed
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Authentication tag verification failed (data may be corrupted or tampered)
    #[error("authentication failed: ciphertext may be corrupted or tampered")]
    AuthenticationFailed,

    /// Cell envelope parsing failed
    #[error("invalid cell envelope: {0}")]
    InvalidEnvelope(String),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Authorization header could not be built
    #[error("authorization not set: {0}")]
    Authorization(String),

    /// REST call returned an unexpected status
    #[error("request failed: {status}, {message}")]
    Request {
        /// HTTP status, or the transport failure sentinel
        status: i32,
        /// Server supplied error message
        message: String,
    },

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading [`Settings`](crate::config::Settings).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The properties file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the properties file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The properties document is not valid XML properties
    #[error("failed to parse properties: {0}")]
    Parse(#[from] quick_xml::DeError),

    /// A required key is absent or empty
    #[error("missing required property: {0}")]
    Missing(&'static str),

    /// A key holds a value that cannot be used
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Property key
        key: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

/// Errors specific to key agent operations.
#[derive(Debug)]
pub enum AgentError {
    /// Agent could not be initialized
    InitializationFailed(String),

    /// Key creation failed
    CreationFailed(String),

    /// Key fetch request failed
    RequestFailed(String),

    /// Key store could not be read or written
    Store(String),

    /// I/O operation failed
    Io(std::io::Error),
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed(msg) => write!(f, "agent initialization failed: {msg}"),
            Self::CreationFailed(msg) => write!(f, "key creation failed: {msg}"),
            Self::RequestFailed(msg) => write!(f, "key request failed: {msg}"),
            Self::Store(msg) => write!(f, "key store error: {msg}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for AgentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
