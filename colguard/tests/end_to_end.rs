//! Access record, record store and file key agent working together on a
//! temporary SQLite database.

use colguard::access::{ensure_access_record, fetch_access_rows};
use colguard::cipher::RESTRICTED;
use colguard::config::Settings;
use colguard::db;
use colguard::header::CellEnvelope;
use colguard::records::{create_record, read_records, PersonnelRow};
use colguard_key_file::FileKeyAgent;
use std::path::Path;
use tempfile::TempDir;

const SCHEMA: [&str; 2] = [
    "CREATE TABLE access (id INTEGER PRIMARY KEY AUTOINCREMENT, first TEXT, last TEXT, zip TEXT, department TEXT)",
    "CREATE TABLE personnel (id INTEGER PRIMARY KEY AUTOINCREMENT, first TEXT, last TEXT, zip TEXT, department TEXT)",
];

/// Writes a properties file the way a deployment would and loads it.
async fn load_settings(dir: &Path) -> Settings {
    let database = dir.join("demo.db");
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE properties SYSTEM "http://java.sun.com/dtd/properties.dtd">
<properties>
  <comment>end to end</comment>
  <entry key="db.url">sqlite://{}?mode=rwc</entry>
  <entry key="db.driver">sqlite</entry>
  <entry key="db.sql.insert.personnel">INSERT INTO personnel (first, last, zip, department) VALUES (?, ?, ?, ?)</entry>
  <entry key="db.sql.select.personnel">SELECT {{columns}} FROM personnel ORDER BY id</entry>
  <entry key="db.sql.insert.access">INSERT INTO access (first, last, zip, department) VALUES (?, ?, ?, ?)</entry>
  <entry key="db.sql.select.access">SELECT first, last, zip, department FROM access</entry>
  <entry key="agent.keystore">{}</entry>
</properties>
"#,
        database.display(),
        dir.join("keystore.json").display()
    );
    let path = dir.join("demo.properties.xml");
    std::fs::write(&path, document).expect("Failed to write properties");

    let settings = Settings::load(&path).expect("Failed to load settings");
    for statement in SCHEMA {
        db::execute(&settings.database, statement, &[]).await.expect("Failed to create schema");
    }
    settings
}

fn open_agent(settings: &Settings) -> FileKeyAgent {
    let keystore = settings.agent_keystore.as_ref().expect("keystore configured");
    FileKeyAgent::open(keystore).expect("Failed to open key store")
}

#[tokio::test]
async fn test_record_read_back_in_plaintext() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let settings = load_settings(temp_dir.path()).await;
    let agent = open_agent(&settings);

    assert!(ensure_access_record(&settings, &agent).await.success);
    assert_eq!(agent.key_count().unwrap(), 4);

    let report = create_record(&settings, &agent, &PersonnelRow::new("Ann", "Lee", "10001", "HR")).await;
    assert!(report.success, "{report}");

    let (report, rows) = read_records(&settings, &agent).await;
    assert!(report.success, "{report}");
    assert_eq!(rows, vec![vec!["Ann", "Lee", "10001", "HR"]]);
}

#[tokio::test]
async fn test_cells_stored_encrypted_under_access_keys() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let settings = load_settings(temp_dir.path()).await;
    let agent = open_agent(&settings);

    ensure_access_record(&settings, &agent).await;
    create_record(&settings, &agent, &PersonnelRow::new("Ann", "Lee", "10001", "HR")).await;

    let access = fetch_access_rows(&settings).await.unwrap();
    let stored = db::fetch_rows(&settings.database, "SELECT first, last, zip, department FROM personnel", &[])
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);

    for (cell, key_id) in stored.rows()[0].iter().zip(access[0].key_ids()) {
        let cell = cell.as_deref().expect("cell is not NULL");
        let envelope = CellEnvelope::parse(cell).expect("cell is an envelope");
        assert_eq!(envelope.key_id(), key_id);
        assert!(!cell.contains("Ann") && !cell.contains("10001"));
    }
}

#[tokio::test]
async fn test_denied_zip_key_masks_column() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let settings = load_settings(temp_dir.path()).await;
    let agent = open_agent(&settings);

    ensure_access_record(&settings, &agent).await;
    create_record(&settings, &agent, &PersonnelRow::new("Ann", "Lee", "10001", "HR")).await;

    assert_eq!(agent.set_column_denied("zip", true).unwrap(), 1);
    let (report, rows) = read_records(&settings, &agent).await;
    assert!(report.success);
    assert_eq!(rows, vec![vec!["Ann", "Lee", RESTRICTED, "HR"]]);

    // Writes need every column key.
    let report = create_record(&settings, &agent, &PersonnelRow::new("Bo", "Kim", "20002", "HR")).await;
    assert!(!report.success);
    assert_eq!(report.status, "There were no keys or access was denied to one or more keys");

    agent.set_column_denied("zip", false).unwrap();
    let (_, rows) = read_records(&settings, &agent).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][2], "10001");
}

#[tokio::test]
async fn test_access_record_created_once() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let settings = load_settings(temp_dir.path()).await;
    let agent = open_agent(&settings);

    assert!(ensure_access_record(&settings, &agent).await.success);
    let report = ensure_access_record(&settings, &agent).await;
    assert!(!report.success);
    assert_eq!(report.status, "Access Record already exists");

    assert_eq!(fetch_access_rows(&settings).await.unwrap().len(), 1);
    assert_eq!(agent.key_count().unwrap(), 4);
}

#[tokio::test]
async fn test_keys_survive_agent_restart() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let settings = load_settings(temp_dir.path()).await;

    {
        let agent = open_agent(&settings);
        ensure_access_record(&settings, &agent).await;
        create_record(&settings, &agent, &PersonnelRow::new("Ann", "Lee", "10001", "HR")).await;
    }

    let agent = open_agent(&settings);
    let (report, rows) = read_records(&settings, &agent).await;
    assert!(report.success);
    assert_eq!(rows, vec![vec!["Ann", "Lee", "10001", "HR"]]);
}

#[tokio::test]
async fn test_all_keys_denied_reads_nothing() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let settings = load_settings(temp_dir.path()).await;
    let agent = open_agent(&settings);

    ensure_access_record(&settings, &agent).await;
    create_record(&settings, &agent, &PersonnelRow::sample()).await;
    for column in ["first", "last", "zip", "department"] {
        agent.set_column_denied(column, true).unwrap();
    }

    let (report, rows) = read_records(&settings, &agent).await;
    assert!(!report.success);
    assert_eq!(report.status, "There were no keys or access was denied to all keys");
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_create_without_access_record_refused() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let settings = load_settings(temp_dir.path()).await;
    let agent = open_agent(&settings);

    let report = create_record(&settings, &agent, &PersonnelRow::sample()).await;
    assert!(!report.success);
    let count = db::fetch_rows(&settings.database, "SELECT id FROM personnel", &[]).await.unwrap();
    assert!(count.is_empty());
}
