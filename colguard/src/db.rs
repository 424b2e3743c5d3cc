//! Statement runner over a single short-lived connection.
//!
//! Every call opens its own connection, runs one statement and closes the
//! connection again, whether or not the statement succeeded. Nothing is
//! pooled across operations.

use crate::config::DatabaseSettings;
use crate::error::Error;
use sqlx::any::{install_default_drivers, AnyRow};
use sqlx::{AnyConnection, Column, Connection, Row};
use tracing::{debug, warn};

/// Text result of a query: column names plus rows of nullable cells.
///
/// Column names come from the returned rows, so an empty result has none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RowSet {
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, compared case-insensitively.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.eq_ignore_ascii_case(name))
    }

    fn from_any_rows(rows: &[AnyRow]) -> Result<Self, Error> {
        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let rows = rows
            .iter()
            .map(|row| {
                (0..row.len()).map(|i| cell_text(row, i)).collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { columns, rows })
    }
}

/// Reads a cell as text, rendering integer and real columns as their digits.
fn cell_text(row: &AnyRow, index: usize) -> Result<Option<String>, sqlx::Error> {
    match row.try_get::<Option<String>, _>(index) {
        Err(sqlx::Error::ColumnDecode { .. }) => {
            if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
                return Ok(value.map(|v| v.to_string()));
            }
            row.try_get::<Option<f64>, _>(index).map(|value| value.map(|v| v.to_string()))
        }
        other => other,
    }
}

async fn connect(settings: &DatabaseSettings) -> Result<AnyConnection, Error> {
    install_default_drivers();
    Ok(AnyConnection::connect(settings.url()).await?)
}

async fn close(connection: AnyConnection) {
    if let Err(e) = connection.close().await {
        warn!("failed to close database connection: {e}");
    }
}

/// Runs a query with text parameters and returns every row as text.
///
/// # Errors
///
/// Returns `Error::Database` if the connection or statement fails, or a
/// column cannot be read as text.
pub async fn fetch_rows(
    settings: &DatabaseSettings,
    sql: &str,
    params: &[&str],
) -> Result<RowSet, Error> {
    debug!("query: {sql}");
    let mut connection = connect(settings).await?;

    let mut query = sqlx::query(sql);
    for param in params {
        query = query.bind(*param);
    }
    let result = query.fetch_all(&mut connection).await;
    close(connection).await;

    RowSet::from_any_rows(&result?)
}

/// Runs a statement with text parameters and returns the affected row count.
///
/// # Errors
///
/// Returns `Error::Database` if the connection or statement fails.
pub async fn execute(settings: &DatabaseSettings, sql: &str, params: &[&str]) -> Result<u64, Error> {
    debug!("statement: {sql}");
    let mut connection = connect(settings).await?;

    let mut query = sqlx::query(sql);
    for param in params {
        query = query.bind(*param);
    }
    let result = query.execute(&mut connection).await;
    close(connection).await;

    Ok(result?.rows_affected())
}

/// Runs each `;`-separated statement of `schema` in order.
///
/// Returns how many statements ran.
///
/// # Errors
///
/// Returns the first statement failure; later statements are not run.
pub async fn apply_schema(settings: &DatabaseSettings, schema: &str) -> Result<usize, Error> {
    let mut applied = 0;
    for statement in schema.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        execute(settings, statement, &[]).await?;
        applied += 1;
    }
    Ok(applied)
}
