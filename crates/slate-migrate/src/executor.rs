//! Migration executor.
//!
//! Scripts run atomically on one dedicated connection while holding the
//! database's writer role. Foreign-key enforcement is switched off for
//! the duration so tables can be rebuilt in any order, and
//! `PRAGMA foreign_key_check` runs before commit instead.

use std::time::{Duration, Instant};

use serde::Serialize;
use slate_core::migrations::{diff, split_statements, DiffWarning, MigrationScript};
use slate_core::SchemaSnapshot;
use slate_runtime::{Database, WriterPermit};
use sqlx::sqlite::SqliteConnection;
use sqlx::Connection;
use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};
use crate::history::{self, SchemaHistory};

/// Options for [`Migrator::apply`] and [`Migrator::apply_sql`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Run everything, then roll back.
    pub dry_run: bool,
}

impl ApplyOptions {
    /// Options for a dry run.
    #[must_use]
    pub const fn dry_run() -> Self {
        Self { dry_run: true }
    }
}

/// Options for [`Migrator::sync`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Run everything, then roll back.
    pub dry_run: bool,
    /// Allow scripts that drop or rebuild tables or drop columns.
    pub allow_destructive: bool,
}

/// What an apply did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Statements executed.
    pub statements: usize,
    /// Whether the changes were rolled back.
    pub dry_run: bool,
    /// Wall time, including the wait for the writer role.
    pub elapsed: Duration,
}

/// What a sync did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    /// The script that was planned.
    pub script: MigrationScript,
    /// `None` when the database was already up to date.
    pub applied: Option<ApplyReport>,
}

impl SyncReport {
    /// Changes the differ noticed but did not act on.
    #[must_use]
    pub fn warnings(&self) -> &[DiffWarning] {
        &self.script.warnings
    }
}

/// The snapshot to store alongside a script.
struct Record<'a> {
    snapshot: &'a SchemaSnapshot,
    script: String,
    destructive: bool,
}

/// Applies migrations to a [`Database`].
#[derive(Debug, Clone)]
pub struct Migrator {
    db: Database,
    history: SchemaHistory,
}

impl Migrator {
    /// Creates a migrator for `db`.
    #[must_use]
    pub fn new(db: Database) -> Self {
        let history = SchemaHistory::new(db.pool().clone());
        Self { db, history }
    }

    /// Returns the schema history.
    #[must_use]
    pub const fn history(&self) -> &SchemaHistory {
        &self.history
    }

    /// Applies a generated script.
    ///
    /// # Errors
    ///
    /// [`MigrateError::Statement`] for the first failing statement and
    /// [`MigrateError::ForeignKeyCheck`] for dangling references; either
    /// way nothing is changed.
    pub async fn apply(&self, script: &MigrationScript, options: ApplyOptions) -> Result<ApplyReport> {
        if script.is_destructive() {
            warn!(tables = ?destructive_tables(script), "applying destructive migration");
        }
        let started = Instant::now();
        let permit = self.db.acquire_writer().await;
        self.run(permit, started, &script.statements(), options.dry_run, None)
            .await
    }

    /// Applies hand-written SQL, split into statements.
    ///
    /// # Errors
    ///
    /// As [`apply`](Self::apply).
    pub async fn apply_sql(&self, sql: &str, options: ApplyOptions) -> Result<ApplyReport> {
        let started = Instant::now();
        let permit = self.db.acquire_writer().await;
        self.run(permit, started, &split_statements(sql), options.dry_run, None)
            .await
    }

    /// Migrates the database from its last stored snapshot to `current`
    /// and stores `current` in the same transaction.
    ///
    /// The writer role is held from reading the stored snapshot until the
    /// new one is committed, so concurrent syncs to the same schema apply
    /// it once.
    ///
    /// # Errors
    ///
    /// [`MigrateError::DestructiveRefused`] if the script is destructive
    /// and `allow_destructive` is off, otherwise as [`apply`](Self::apply).
    pub async fn sync(&self, current: &SchemaSnapshot, options: SyncOptions) -> Result<SyncReport> {
        let started = Instant::now();
        let permit = self.db.acquire_writer().await;
        let previous = self.history.latest().await?;
        let script = diff(current, previous.as_ref());
        for warning in &script.warnings {
            warn!(%warning, "schema diff warning");
        }

        if script.is_empty() && previous.is_some() {
            info!("schema up to date");
            return Ok(SyncReport {
                script,
                applied: None,
            });
        }
        let destructive = script.is_destructive();
        if destructive && !options.allow_destructive {
            return Err(MigrateError::DestructiveRefused(destructive_tables(&script)));
        }

        let record = Record {
            snapshot: current,
            script: script.to_sql(),
            destructive,
        };
        let applied = self
            .run(permit, started, &script.statements(), options.dry_run, Some(record))
            .await?;
        Ok(SyncReport {
            script,
            applied: Some(applied),
        })
    }

    async fn run(
        &self,
        _permit: WriterPermit,
        started: Instant,
        statements: &[String],
        dry_run: bool,
        record: Option<Record<'_>>,
    ) -> Result<ApplyReport> {
        let mut conn = self.db.pool().acquire().await?;
        info!(statements = statements.len(), dry_run, "Applying migration");

        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(&mut *conn)
            .await?;
        let outcome = run_in_transaction(&mut conn, statements, dry_run, record).await;
        let restored = sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&mut *conn)
            .await;
        outcome?;
        restored?;

        let report = ApplyReport {
            statements: statements.len(),
            dry_run,
            elapsed: started.elapsed(),
        };
        if dry_run {
            info!(elapsed = ?report.elapsed, "Dry run rolled back");
        } else {
            info!(elapsed = ?report.elapsed, "Migration applied successfully");
        }
        Ok(report)
    }
}

async fn run_in_transaction(
    conn: &mut SqliteConnection,
    statements: &[String],
    dry_run: bool,
    record: Option<Record<'_>>,
) -> Result<()> {
    let mut tx = conn.begin().await?;
    for (index, sql) in statements.iter().enumerate() {
        debug!(index, sql = %sql, "Executing SQL");
        if let Err(source) = sqlx::query(sql).execute(&mut *tx).await {
            warn!(index, error = %source, "Statement failed, rolling back");
            tx.rollback().await?;
            return Err(MigrateError::Statement {
                index,
                sql: sql.clone(),
                source,
            });
        }
    }

    let violations = foreign_key_violations(&mut tx).await?;
    if !violations.is_empty() {
        warn!(count = violations.len(), "Foreign key check failed, rolling back");
        tx.rollback().await?;
        return Err(MigrateError::ForeignKeyCheck(violations));
    }

    if let Some(record) = record {
        if let Err(err) = history::record(&mut tx, record.snapshot, &record.script, record.destructive).await {
            tx.rollback().await?;
            return Err(err);
        }
    }

    if dry_run {
        tx.rollback().await?;
    } else {
        tx.commit().await?;
    }
    Ok(())
}

async fn foreign_key_violations(conn: &mut SqliteConnection) -> Result<Vec<String>> {
    let rows: Vec<(String, Option<i64>, String, i64)> = sqlx::query_as("PRAGMA foreign_key_check")
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(table, rowid, parent, _)| match rowid {
            Some(rowid) => format!("{table} row {rowid} references missing {parent} row"),
            None => format!("{table} references missing {parent} row"),
        })
        .collect())
}

fn destructive_tables(script: &MigrationScript) -> Vec<String> {
    let mut tables: Vec<String> = script
        .ops
        .iter()
        .filter(|op| op.is_destructive())
        .map(|op| op.table_name().to_string())
        .collect();
    tables.dedup();
    tables
}
