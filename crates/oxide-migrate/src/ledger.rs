//! Ledger of applied migration steps.
//!
//! This module manages the `migration_ledger` table. Rows are only ever
//! appended, one per successfully applied step, inside the step's own
//! transaction; nothing here updates or deletes them.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use sqlx::SqliteConnection;

use crate::error::Result;
use crate::step::MigrationStep;

/// SQL to create the ledger table (SQLite).
pub const CREATE_LEDGER_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS migration_ledger (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product TEXT NOT NULL,
    version TEXT NOT NULL,
    step TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(product, step)
)
"#;

const SELECT_ENTRIES: &str = "SELECT id, product, version, step, applied_at FROM migration_ledger";

/// A record of an applied step.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    /// Row id; increases with application order.
    pub id: i64,
    /// Product name.
    pub product: String,
    /// Version the step belongs to.
    pub version: String,
    /// Step identifier, `"{version}/{name}"`.
    pub step: String,
    /// When the step was applied.
    pub applied_at: DateTime<Utc>,
}

type EntryRow = (i64, String, String, String, String);

impl From<EntryRow> for LedgerEntry {
    fn from((id, product, version, step, applied_at): EntryRow) -> Self {
        Self {
            id,
            product,
            version,
            step,
            applied_at: parse_timestamp(&applied_at),
        }
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // SQLite datetime format fallback
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .map(|dt| dt.and_utc())
                .unwrap_or_else(|_| Utc::now())
        })
}

/// Reads and appends ledger rows.
#[derive(Debug, Clone)]
pub struct MigrationLedger {
    pool: SqlitePool,
}

impl MigrationLedger {
    /// Creates a ledger over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Ensures the ledger table exists.
    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(CREATE_LEDGER_TABLE_SQL)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Appends `step` through `conn`, normally the step's open transaction.
    ///
    /// Returns the raw database error so the caller can report it as a
    /// ledger failure and roll back.
    pub async fn record(
        &self,
        conn: &mut SqliteConnection,
        step: &MigrationStep,
    ) -> std::result::Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO migration_ledger (product, version, step) VALUES (?, ?, ?)")
            .bind(step.product)
            .bind(step.version.to_string())
            .bind(step.id())
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Identifiers of the steps applied for `product`.
    pub async fn recorded_steps(&self, product: &str) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT step FROM migration_ledger WHERE product = ?")
                .bind(product)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(step,)| step).collect())
    }

    /// Checks if a step has been applied.
    pub async fn is_recorded(&self, product: &str, step: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM migration_ledger WHERE product = ? AND step = ?")
                .bind(product)
                .bind(step)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// All entries in application order, optionally for one product.
    pub async fn entries(&self, product: Option<&str>) -> Result<Vec<LedgerEntry>> {
        let rows: Vec<EntryRow> = match product {
            Some(product) => {
                sqlx::query_as(&format!("{} WHERE product = ? ORDER BY id", SELECT_ENTRIES))
                    .bind(product)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as(&format!("{} ORDER BY id", SELECT_ENTRIES))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows.into_iter().map(LedgerEntry::from).collect())
    }

    /// The most recently applied step of `product`.
    pub async fn last_applied(&self, product: &str) -> Result<Option<LedgerEntry>> {
        let row: Option<EntryRow> = sqlx::query_as(&format!(
            "{} WHERE product = ? ORDER BY id DESC LIMIT 1",
            SELECT_ENTRIES
        ))
        .bind(product)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(LedgerEntry::from))
    }

    /// Number of applied steps of `product`.
    pub async fn count(&self, product: &str) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM migration_ledger WHERE product = ?")
            .bind(product)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}
