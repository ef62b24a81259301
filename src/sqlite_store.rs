//! SQLite-backed [`EscalationStore`].
//!
//! One table, `escalations`, created on open. The database file and its
//! parent directory are created when missing; the journal runs in WAL mode
//! so `deskhand escalations` can read while the server writes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;

use deskhand_core::models::EscalationRecord;
use deskhand_core::store::EscalationStore;

use crate::config::Config;

const MAX_CONNECTIONS: u32 = 5;

const SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS escalations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        query TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_escalations_created_at ON escalations(created_at DESC)",
];

/// Escalation rows in the `escalations` table, one per recorded hand-off.
pub struct SqliteEscalationStore {
    pool: SqlitePool,
}

impl SqliteEscalationStore {
    /// Open `[db].path` and make sure the schema exists. Idempotent.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = connect(&config.db.path)
            .await
            .with_context(|| format!("Failed to open database {}", config.db.path.display()))?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }

    /// Most recent escalations first.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<EscalationRecord>> {
        let rows = sqlx::query(
            "SELECT name, email, query, created_at FROM escalations ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<EscalationRecord> {
                let timestamp: DateTime<Utc> = row.try_get("created_at")?;
                Ok(EscalationRecord {
                    name: row.try_get("name")?,
                    email: row.try_get("email")?,
                    query: row.try_get("query")?,
                    timestamp,
                })
            })
            .collect()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn connect(path: &Path) -> Result<SqlitePool> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)?,
        _ => {}
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    Ok(SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await?)
}

#[async_trait]
impl EscalationStore for SqliteEscalationStore {
    fn backend(&self) -> &str {
        "sqlite"
    }

    async fn persist(&self, record: &EscalationRecord) -> Result<()> {
        sqlx::query("INSERT INTO escalations (name, email, query, created_at) VALUES (?, ?, ?, ?)")
            .bind(&record.name)
            .bind(&record.email)
            .bind(&record.query)
            .bind(record.timestamp)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
