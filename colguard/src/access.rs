//! Access table: the key identifiers protecting each personnel column.
//!
//! The table holds a single row mapping the four protected columns to the
//! ids of their keys. It is written once at setup; readers use it to learn
//! which keys to request from the agent.

use crate::agent::{CreateKeyRequest, Key, KeyAgent, KeyAttributes, COLUMN_NAME_ATTRIBUTE};
use crate::config::Settings;
use crate::db;
use crate::error::Error;
use crate::report::Report;
use tracing::{debug, error, info, warn};

/// Table whose cells the protected columns live in.
pub const PERSONNEL_TABLE: &str = "personnel";

/// Prefix of the caller-side reference sent with each key request.
pub const KEY_REF_PREFIX: &str = "colguard";

const CREATE_ACCESS_RECORD: &str = "Create Access Record";

/// A personnel column guarded by its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectedColumn {
    /// Column name in SQL and in the key's `column_name` attribute
    pub name: &'static str,
    /// Table heading
    pub label: &'static str,
    /// Holds personally identifying content
    pub personal: bool,
}

impl ProtectedColumn {
    /// Key attributes requested for this column.
    #[must_use]
    pub fn attributes(&self) -> KeyAttributes {
        let attributes = KeyAttributes::new()
            .with("control_access", "true")
            .with(COLUMN_NAME_ATTRIBUTE, self.name);
        if self.personal {
            attributes.with("classification", "pi")
        } else {
            attributes
        }
    }

    #[must_use]
    pub fn key_request(&self) -> CreateKeyRequest {
        CreateKeyRequest::new(format!("{KEY_REF_PREFIX}-{}", self.name), self.attributes())
    }
}

/// The protected columns, in table order.
pub const PROTECTED_COLUMNS: [ProtectedColumn; 4] = [
    ProtectedColumn { name: "first", label: "First", personal: false },
    ProtectedColumn { name: "last", label: "Last", personal: true },
    ProtectedColumn { name: "zip", label: "Zip", personal: true },
    ProtectedColumn { name: "department", label: "Department", personal: false },
];

/// One access table row: a key id per protected column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRow {
    pub first: String,
    pub last: String,
    pub zip: String,
    pub department: String,
}

impl AccessRow {
    /// Key ids in [`PROTECTED_COLUMNS`] order.
    #[must_use]
    pub fn key_ids(&self) -> [&str; 4] {
        [&self.first, &self.last, &self.zip, &self.department]
    }

    fn from_cells(cells: [String; 4]) -> Self {
        let [first, last, zip, department] = cells;
        Self { first, last, zip, department }
    }
}

/// Reads every access row.
///
/// # Errors
///
/// Returns `Error::Database` if the query fails, or returns rows without the
/// four protected columns.
pub async fn fetch_access_rows(settings: &Settings) -> Result<Vec<AccessRow>, Error> {
    let rows = db::fetch_rows(&settings.database, &settings.database.sql.select_access, &[]).await?;
    // An empty result carries no column names to resolve.
    if rows.is_empty() {
        debug!("access rows: 0");
        return Ok(Vec::new());
    }

    let mut indexes = [0usize; 4];
    for (slot, column) in indexes.iter_mut().zip(&PROTECTED_COLUMNS) {
        *slot = rows
            .column_index(column.name)
            .ok_or_else(|| sqlx::Error::ColumnNotFound(column.name.to_string()))?;
    }

    let access_rows = rows
        .rows()
        .iter()
        .map(|row| {
            AccessRow::from_cells(
                indexes.map(|i| row.get(i).cloned().flatten().unwrap_or_default()),
            )
        })
        .collect::<Vec<_>>();
    debug!("access rows: {}", access_rows.len());
    Ok(access_rows)
}

/// Creates the access row unless one already exists.
///
/// Requests one key per protected column and inserts their ids as a single
/// row. If any key is missing from the agent's answer nothing is written.
pub async fn ensure_access_record(settings: &Settings, agent: &dyn KeyAgent) -> Report {
    match fetch_access_rows(settings).await {
        Ok(rows) if !rows.is_empty() => {
            return Report::failed(CREATE_ACCESS_RECORD, "Access Record already exists");
        }
        Ok(_) => {}
        Err(e) => {
            let status = format!("ERROR: Failure to access database. {e}");
            error!("{CREATE_ACCESS_RECORD} {status}");
            return Report::failed(CREATE_ACCESS_RECORD, status);
        }
    }

    let requests: Vec<CreateKeyRequest> =
        PROTECTED_COLUMNS.iter().map(ProtectedColumn::key_request).collect();
    let keys = match agent.create_keys(&requests).await {
        Ok(keys) => keys,
        Err(e) => {
            error!("key creation failed: {e}");
            return Report::failed(CREATE_ACCESS_RECORD, format!("ERROR: Failure to create keys. {e}"));
        }
    };

    let Some(ids) = ids_by_column(&keys) else {
        warn!("agent returned {} key(s) for {} columns", keys.len(), PROTECTED_COLUMNS.len());
        return Report::failed(
            CREATE_ACCESS_RECORD,
            format!("ERROR: Key creation returned {} of {} keys", keys.len(), PROTECTED_COLUMNS.len()),
        );
    };

    let params: Vec<&str> = ids.iter().map(String::as_str).collect();
    match db::execute(&settings.database, &settings.database.sql.insert_access, &params).await {
        Ok(inserted) => {
            info!("{inserted} access record(s) created");
            Report::succeeded(CREATE_ACCESS_RECORD, format!("{inserted} access record(s) created"))
        }
        Err(e) => {
            let status = format!("ERROR: Failure to access database. {e}");
            error!("{CREATE_ACCESS_RECORD} {status}");
            Report::failed(CREATE_ACCESS_RECORD, status)
        }
    }
}

/// Maps created keys back to columns through their `column_name` attribute.
fn ids_by_column(keys: &[Key]) -> Option<[String; 4]> {
    let mut ids: [Option<String>; 4] = Default::default();
    for (slot, column) in ids.iter_mut().zip(&PROTECTED_COLUMNS) {
        *slot = keys
            .iter()
            .find(|key| key.column_name() == Some(column.name))
            .map(|key| key.id().to_string());
    }
    let [first, last, zip, department] = ids;
    Some([first?, last?, zip?, department?])
}

/// Fetches the keys the caller may use for the stored access row, printing
/// how many came back.
///
/// Fails closed: any database or agent failure yields an empty list.
pub async fn access_keys(settings: &Settings, agent: &dyn KeyAgent) -> Vec<Key> {
    let keys = accessible_keys(settings, agent).await;
    if keys.is_empty() {
        eprintln!("There were no keys or access was denied to the keys");
    } else {
        println!("Keys: {}", keys.len());
    }
    keys
}

/// Same as [`access_keys`] without printing.
pub async fn accessible_keys(settings: &Settings, agent: &dyn KeyAgent) -> Vec<Key> {
    let rows = match fetch_access_rows(settings).await {
        Ok(rows) => rows,
        Err(e) => {
            error!("ERROR: Failure to access database. {e}");
            return Vec::new();
        }
    };
    // The last row wins if more than one was ever written.
    let Some(row) = rows.last() else {
        return Vec::new();
    };
    let ids: Vec<String> = row.key_ids().iter().map(|id| (*id).to_string()).collect();
    agent.get_keys(&ids).await.unwrap_or_else(|e| {
        error!("{e}");
        Vec::new()
    })
}
