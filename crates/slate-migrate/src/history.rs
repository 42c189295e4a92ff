//! Schema history tracking.
//!
//! Every applied sync stores the snapshot it migrated to, so the next
//! start can diff the declared schema against what the database holds.
//! The table is created lazily inside the migrating transaction; reading
//! from a database that never synced yields no history.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use slate_core::SchemaSnapshot;
use sqlx::sqlite::{SqliteConnection, SqlitePool};

use crate::error::Result;

/// Name of the history table.
pub const HISTORY_TABLE: &str = "_slate_schema_history";

/// SQL to create the history table.
pub const CREATE_HISTORY_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS _slate_schema_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    applied_at TEXT NOT NULL DEFAULT (datetime('now')),
    snapshot TEXT NOT NULL,
    script TEXT NOT NULL,
    destructive INTEGER NOT NULL DEFAULT 0
)
"#;

/// One applied sync.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    /// Row id, increasing with each sync.
    pub id: i64,
    /// When the sync was committed.
    pub applied_at: DateTime<Utc>,
    /// The schema the database was migrated to.
    pub snapshot: SchemaSnapshot,
    /// The SQL that was run.
    pub script: String,
    /// Whether the script dropped or rebuilt anything.
    pub destructive: bool,
}

/// Reads the schema history of one database.
#[derive(Debug, Clone)]
pub struct SchemaHistory {
    pool: SqlitePool,
}

impl SchemaHistory {
    /// Creates a history reader over `pool`.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn exists(&self) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(HISTORY_TABLE)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// The most recently stored snapshot, if any sync was committed.
    pub async fn latest(&self) -> Result<Option<SchemaSnapshot>> {
        if !self.exists().await? {
            return Ok(None);
        }
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT snapshot FROM _slate_schema_history ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(json,)| SchemaSnapshot::from_json(&json))
            .transpose()
            .map_err(Into::into)
    }

    /// Every committed sync, oldest first.
    pub async fn entries(&self) -> Result<Vec<HistoryEntry>> {
        if !self.exists().await? {
            return Ok(Vec::new());
        }
        let rows: Vec<(i64, String, String, String, bool)> = sqlx::query_as(
            "SELECT id, applied_at, snapshot, script, destructive FROM _slate_schema_history ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for (id, applied_at, snapshot, script, destructive) in rows {
            entries.push(HistoryEntry {
                id,
                applied_at: parse_applied_at(&applied_at),
                snapshot: SchemaSnapshot::from_json(&snapshot)?,
                script,
                destructive,
            });
        }
        Ok(entries)
    }
}

/// Stores `snapshot` on `conn`, creating the table first if needed. Runs
/// inside the caller's transaction.
pub(crate) async fn record(
    conn: &mut SqliteConnection,
    snapshot: &SchemaSnapshot,
    script: &str,
    destructive: bool,
) -> Result<()> {
    sqlx::query(CREATE_HISTORY_TABLE_SQL)
        .execute(&mut *conn)
        .await?;
    sqlx::query("INSERT INTO _slate_schema_history (snapshot, script, destructive) VALUES (?, ?, ?)")
        .bind(snapshot.to_json()?)
        .bind(script)
        .bind(destructive)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn parse_applied_at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // SQLite datetime('now') format
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|dt| dt.and_utc())
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use slate_core::schema::{integer, text, TableDescriptor};
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::Connection;

    async fn pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap()
    }

    fn snapshot() -> SchemaSnapshot {
        SchemaSnapshot::from_tables(vec![TableDescriptor::new("users")
            .column(integer("id").primary_key())
            .column(text("name"))])
        .unwrap()
    }

    #[tokio::test]
    async fn test_missing_table_means_no_history() {
        let history = SchemaHistory::new(pool().await);
        assert!(history.latest().await.unwrap().is_none());
        assert!(history.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_and_read_back() {
        let pool = pool().await;
        {
            let mut conn = pool.acquire().await.unwrap();
            record(&mut conn, &SchemaSnapshot::new(), "", false)
                .await
                .unwrap();
            record(&mut conn, &snapshot(), "CREATE TABLE \"users\" (...);\n", false)
                .await
                .unwrap();
        }
        let history = SchemaHistory::new(pool);
        assert_eq!(history.latest().await.unwrap(), Some(snapshot()));

        let entries = history.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].snapshot.is_empty());
        assert!(entries[0].id < entries[1].id);
        assert!(!entries[1].destructive);
        assert!(entries[1].applied_at > DateTime::<Utc>::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn test_record_rolls_back_with_its_transaction() {
        let pool = pool().await;
        {
            let mut conn = pool.acquire().await.unwrap();
            let mut tx = conn.begin().await.unwrap();
            record(&mut tx, &snapshot(), "", true).await.unwrap();
            tx.rollback().await.unwrap();
        }
        let history = SchemaHistory::new(pool);
        assert!(history.latest().await.unwrap().is_none());
    }

    #[test]
    fn test_parse_applied_at_formats() {
        let sqlite = parse_applied_at("2024-03-01 12:30:00");
        assert_eq!(sqlite.to_rfc3339(), "2024-03-01T12:30:00+00:00");
        let rfc = parse_applied_at("2024-03-01T12:30:00Z");
        assert_eq!(rfc, sqlite);
        assert_eq!(parse_applied_at("garbage"), DateTime::<Utc>::UNIX_EPOCH);
    }
}
