//! # `colguard`
//!
//! Column-level key access control for a relational table, plus clients for
//! a SCIM directory and tenant policy API.
//!
//! ## Features
//!
//! - One agent-issued key per protected column, recorded in an access table
//! - Per-cell ChaCha20-Poly1305 encryption bound to table and column
//! - Reads that mask every column whose key is denied as `RESTRICTED`
//! - Fail-closed writes: a record is stored only if every column key is available
//! - HTTP envelope that turns transport failures into a status code
//! - Poll-with-backoff wait for server-side policy propagation
//!
//! ## Example
//!
//! ```rust,ignore
//! use colguard::prelude::*;
//! use colguard_key_file::FileKeyAgent;
//!
//! let settings = Settings::load("demo.properties.xml")?;
//! let agent = FileKeyAgent::open("keystore.json")?;
//!
//! ensure_access_record(&settings, &agent).await.print();
//! create_record(&settings, &agent, &PersonnelRow::new("Ann", "Lee", "10001", "HR")).await.print();
//! let (report, rows) = read_records(&settings, &agent).await;
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod access;
pub mod agent;
pub mod cipher;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod header;
pub mod http;
pub mod policy;
pub mod records;
pub mod report;
pub mod scenario;
pub mod scim;
pub mod wait;

#[cfg(test)]
mod testing;

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::access::{access_keys, ensure_access_record, AccessRow, PROTECTED_COLUMNS};
    pub use crate::agent::{CreateKeyRequest, Key, KeyAgent, KeyAttributes};
    pub use crate::cipher::{Keyring, RowDecoder, RESTRICTED};
    pub use crate::config::{Properties, Settings};
    pub use crate::context::CellContext;
    pub use crate::error::{AgentError, ConfigError, Error};
    pub use crate::http::{Authorization, HttpMethod, HttpPorter, HttpResponse, TRANSPORT_FAILURE};
    pub use crate::records::{create_record, read_records, PersonnelRow};
    pub use crate::report::Report;
    pub use crate::wait::{wait_until, PollConfig, WaitOutcome};
}
