//! Personnel record store with per-column access control.
//!
//! Writes need every column key: a record is either stored fully encrypted
//! or not at all. Reads select only the columns whose key the caller was
//! granted; every other column comes back as the `RESTRICTED` literal,
//! decided while the query is built.

use crate::access::{access_keys, PERSONNEL_TABLE, PROTECTED_COLUMNS};
use crate::agent::KeyAgent;
use crate::cipher::{encrypt_cell, Keyring, RowDecoder, RESTRICTED};
use crate::config::{Settings, COLUMNS_PLACEHOLDER};
use crate::context::CellContext;
use crate::db;
use crate::report::Report;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, error, info};

/// Separator line of the personnel table.
pub const TABLE_RULE: &str =
    "|------------|--------------|--------------|--------------|--------------|";
/// Heading line of the personnel table.
pub const TABLE_HEADER: &str =
    "| Personnel  | First        | Last         | Zip          | Department   |";

const CELL_WIDTH: usize = 12;
const ROW_LEAD: &str = "|            | ";

const CREATE_PERSONNEL_RECORD: &str = "Create Personnel Record";
const READ_PERSONNEL_RECORDS: &str = "Read Personnel Records";

const FIRST_NAMES: [&str; 20] = [
    "James", "Mary", "John", "Patricia", "Robert", "Jennifer", "Michael", "Linda", "William",
    "Elizabeth", "David", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
    "Charles", "Karen",
];
const LAST_NAMES: [&str; 20] = [
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Miller", "Davis", "Garcia", "Rodriguez",
    "Wilson", "Martinez", "Anderson", "Taylor", "Thomas", "Hernandez", "Moore", "Martin",
    "Jackson", "Thompson", "White",
];
const DEPARTMENTS: [&str; 3] = ["Engineering", "HR", "Marketing"];

/// One personnel record in plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonnelRow {
    pub first: String,
    pub last: String,
    pub zip: String,
    pub department: String,
}

impl PersonnelRow {
    #[must_use]
    pub fn new(
        first: impl Into<String>,
        last: impl Into<String>,
        zip: impl Into<String>,
        department: impl Into<String>,
    ) -> Self {
        Self { first: first.into(), last: last.into(), zip: zip.into(), department: department.into() }
    }

    /// A random record: common names, a five digit zip and a department.
    #[must_use]
    pub fn sample() -> Self {
        let mut rng = rand::thread_rng();
        Self::new(
            pick(&FIRST_NAMES, &mut rng),
            pick(&LAST_NAMES, &mut rng),
            format!("{:05}", rng.gen_range(0..100_000)),
            pick(&DEPARTMENTS, &mut rng),
        )
    }

    /// Cell values in [`PROTECTED_COLUMNS`] order.
    #[must_use]
    pub fn cells(&self) -> [&str; 4] {
        [&self.first, &self.last, &self.zip, &self.department]
    }
}

fn pick<R: Rng>(names: &[&'static str], rng: &mut R) -> &'static str {
    names.choose(rng).copied().unwrap_or_default()
}

fn cell_contexts() -> Vec<CellContext> {
    PROTECTED_COLUMNS.iter().map(|column| CellContext::new(PERSONNEL_TABLE, column.name)).collect()
}

/// Encrypts and inserts one personnel record.
///
/// Refuses to write unless a key is available for every protected column.
pub async fn create_record(settings: &Settings, agent: &dyn KeyAgent, row: &PersonnelRow) -> Report {
    const DENIED: &str = "There were no keys or access was denied to one or more keys";

    let keys = access_keys(settings, agent).await;
    if keys.len() < PROTECTED_COLUMNS.len() {
        return Report::failed(CREATE_PERSONNEL_RECORD, DENIED);
    }
    let keyring = Keyring::new(keys);

    let mut encrypted = Vec::with_capacity(PROTECTED_COLUMNS.len());
    for ((column, context), plaintext) in PROTECTED_COLUMNS.iter().zip(cell_contexts()).zip(row.cells()) {
        let Some(key) = keyring.for_column(column.name) else {
            debug!("no key tagged for column {}", column.name);
            return Report::failed(CREATE_PERSONNEL_RECORD, DENIED);
        };
        match encrypt_cell(key, plaintext, &context) {
            Ok(cell) => encrypted.push(cell),
            Err(e) => {
                error!("{context}: {e}");
                return Report::failed(
                    CREATE_PERSONNEL_RECORD,
                    format!("ERROR: Failure to encrypt record. {e}"),
                );
            }
        }
    }

    let params: Vec<&str> = encrypted.iter().map(String::as_str).collect();
    if let Err(e) = db::execute(&settings.database, &settings.database.sql.insert_personnel, &params).await {
        let status = format!("ERROR: Failure to access database. {e}");
        error!("{status}");
        return Report::failed(CREATE_PERSONNEL_RECORD, status);
    }

    println!("{}", render_table(&[row.cells()]));
    info!("personnel record created");
    Report::succeeded(CREATE_PERSONNEL_RECORD, "personnel record created")
}

/// Reads and decrypts every personnel record the caller may see.
///
/// Returns the report together with the decoded rows.
pub async fn read_records(settings: &Settings, agent: &dyn KeyAgent) -> (Report, Vec<Vec<String>>) {
    let keys = access_keys(settings, agent).await;
    if keys.is_empty() {
        return (
            Report::failed(READ_PERSONNEL_RECORDS, "There were no keys or access was denied to all keys"),
            Vec::new(),
        );
    }
    let keyring = Keyring::new(keys);

    let allowed: Vec<&str> = PROTECTED_COLUMNS
        .iter()
        .map(|column| column.name)
        .filter(|name| keyring.for_column(name).is_some())
        .collect();
    let sql = build_select(&settings.database.sql.select_personnel, &allowed);

    let rows = match db::fetch_rows(&settings.database, &sql, &[]).await {
        Ok(rows) => rows,
        Err(e) => {
            let status = format!("ERROR: Failure to access database. {e}");
            error!("{status}");
            return (Report::failed(READ_PERSONNEL_RECORDS, status), Vec::new());
        }
    };

    let decoder = RowDecoder::new(&keyring);
    let contexts = cell_contexts();
    let decoded: Vec<Vec<String>> =
        rows.rows().iter().map(|row| decoder.decode_row(row, &contexts)).collect();

    println!("Rows: {}", decoded.len());
    println!("{}", render_table(&decoded));

    let status = format!("{} record(s) read", decoded.len());
    (Report::succeeded(READ_PERSONNEL_RECORDS, status), decoded)
}

/// Substitutes the select list into `template`.
///
/// Columns in `allowed` are selected as stored; every other protected column
/// is replaced by the `RESTRICTED` literal under its own name.
#[must_use]
pub fn build_select(template: &str, allowed: &[&str]) -> String {
    let columns = PROTECTED_COLUMNS
        .iter()
        .map(|column| {
            if allowed.contains(&column.name) {
                column.name.to_string()
            } else {
                format!("'{RESTRICTED}' AS {}", column.name)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    template.replace(COLUMNS_PLACEHOLDER, &columns)
}

/// Renders one table row, each cell left-justified to twelve characters.
#[must_use]
pub fn render_row<S: AsRef<str>>(cells: &[S]) -> String {
    let mut line = String::from(ROW_LEAD);
    for cell in cells {
        line.push_str(&format!("{:<width$} | ", cell.as_ref(), width = CELL_WIDTH));
    }
    line.truncate(line.trim_end().len());
    line
}

/// Renders the personnel table around `rows`.
#[must_use]
pub fn render_table<R: AsRef<[S]>, S: AsRef<str>>(rows: &[R]) -> String {
    let mut lines = vec![TABLE_RULE.to_string(), TABLE_HEADER.to_string(), TABLE_RULE.to_string()];
    lines.extend(rows.iter().map(|row| render_row(row.as_ref())));
    lines.push(TABLE_RULE.to_string());
    lines.join("\n")
}
