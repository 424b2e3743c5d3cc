//! Shared fixtures for unit tests: a throwaway SQLite database.

use crate::config::{self, Properties, Settings};
use crate::db;
use std::path::Path;

const SCHEMA: [&str; 2] = [
    "CREATE TABLE access (id INTEGER PRIMARY KEY AUTOINCREMENT, first TEXT, last TEXT, zip TEXT, department TEXT)",
    "CREATE TABLE personnel (id INTEGER PRIMARY KEY AUTOINCREMENT, first TEXT, last TEXT, zip TEXT, department TEXT)",
];

/// Settings pointing at a fresh database under `dir`, with both tables created.
pub async fn sqlite_settings(dir: &Path) -> Settings {
    let mut properties = Properties::default();
    properties.set(config::DB_URL, format!("sqlite://{}?mode=rwc", dir.join("demo.db").display()));
    properties.set(
        config::DB_SQL_INSERT_PERSONNEL,
        "INSERT INTO personnel (first, last, zip, department) VALUES (?, ?, ?, ?)",
    );
    properties.set(config::DB_SQL_SELECT_PERSONNEL, "SELECT {columns} FROM personnel ORDER BY id");
    properties.set(
        config::DB_SQL_INSERT_ACCESS,
        "INSERT INTO access (first, last, zip, department) VALUES (?, ?, ?, ?)",
    );
    properties.set(config::DB_SQL_SELECT_ACCESS, "SELECT id, first, last, zip, department FROM access");

    let settings = Settings::from_properties(&properties).unwrap();
    for statement in SCHEMA {
        db::execute(&settings.database, statement, &[]).await.unwrap();
    }
    settings
}
