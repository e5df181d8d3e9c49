//! SQLite connection and schema setup for the structured record store.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;
use crate::models::PropertyFields;

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create the records table and its indexes. Idempotent.
///
/// The property attribute columns are generated from
/// [`PropertyFields::NAMES`] so the table and the structured schema cannot
/// drift apart.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let attribute_columns = PropertyFields::NAMES
        .iter()
        .map(|name| format!("{} TEXT", name))
        .collect::<Vec<_>>()
        .join(",\n            ");

    let create = format!(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            upload_id TEXT PRIMARY KEY,
            index_dir TEXT NOT NULL,
            source_file TEXT NOT NULL,
            report_type TEXT,
            {},
            fields_json TEXT NOT NULL DEFAULT '{{}}',
            created_at INTEGER NOT NULL
        )
        "#,
        attribute_columns
    );

    sqlx::query(&create).execute(pool).await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_created_at ON records(created_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_report_type ON records(report_type)")
        .execute(pool)
        .await?;

    Ok(())
}
