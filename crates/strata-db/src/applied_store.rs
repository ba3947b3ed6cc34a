use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, params};
use serde::{Deserialize, Serialize};
use strata_common::{Error, Result};
use tracing::{info, warn};

pub const DEFAULT_TABLE: &str = "_migrations";

/// Bookkeeping table recording which migrations are applied.
///
/// Writes take a `Transaction` so they commit or roll back together with the
/// schema change they describe.
#[derive(Debug, Clone)]
pub struct AppliedStore {
    table: String,
}

/// A row of the applied-state table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedMigration {
    pub id: String,
    pub applied_at: DateTime<Utc>,
}

impl Default for AppliedStore {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

impl AppliedStore {
    /// Use `table` as the bookkeeping table. The name is interpolated into SQL,
    /// so only plain identifiers are accepted.
    pub fn new(table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn exists(&self, conn: &Connection) -> Result<bool> {
        conn.query_row(
            "SELECT count(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
            params![self.table],
            |row| row.get(0),
        )
        .map_err(|e| Error::Database(format!("failed to check {}: {e}", self.table)))
    }

    /// Create the table if absent. Returns `true` when it was created.
    pub fn ensure_table(&self, conn: &Connection) -> Result<bool> {
        if self.exists(conn)? {
            return Ok(false);
        }

        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS [{}] (
                id TEXT PRIMARY KEY NOT NULL,
                applied_at TEXT NOT NULL
            );",
            self.table
        ))
        .map_err(|e| Error::Database(format!("failed to create {}: {e}", self.table)))?;

        info!("created migration table {}", self.table);
        Ok(true)
    }

    /// Applied ids in ascending order.
    pub fn list_applied(&self, conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare(&format!("SELECT id FROM [{}] ORDER BY id ASC", self.table))
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Database(format!("failed to query applied migrations: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(format!("failed to read applied migration row: {e}")))
    }

    pub fn list_records(&self, conn: &Connection) -> Result<Vec<AppliedMigration>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, applied_at FROM [{}] ORDER BY id ASC",
                self.table
            ))
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let applied_at = parse_datetime(&id, row.get::<_, String>(1)?);
                Ok(AppliedMigration { id, applied_at })
            })
            .map_err(|e| Error::Database(format!("failed to query applied migrations: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(
                row.map_err(|e| {
                    Error::Database(format!("failed to read applied migration row: {e}"))
                })?,
            );
        }
        Ok(records)
    }

    pub fn record_applied(&self, tx: &Transaction<'_>, id: &str) -> Result<()> {
        tx.execute(
            &format!(
                "INSERT INTO [{}] (id, applied_at) VALUES (?1, ?2)",
                self.table
            ),
            params![id, Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::Database(format!("failed to record {id} as applied: {e}")))?;
        Ok(())
    }

    /// Delete the row for `id`. A missing row means the bookkeeping disagrees
    /// with the caller and is reported as an error.
    pub fn record_reverted(&self, tx: &Transaction<'_>, id: &str) -> Result<()> {
        let deleted = tx
            .execute(
                &format!("DELETE FROM [{}] WHERE id = ?1", self.table),
                params![id],
            )
            .map_err(|e| Error::Database(format!("failed to record {id} as reverted: {e}")))?;

        if deleted == 0 {
            return Err(Error::Database(format!(
                "migration {id} is not recorded as applied"
            )));
        }
        Ok(())
    }
}

fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if !valid {
        return Err(Error::Config(format!(
            "invalid migration table name: {table:?}"
        )));
    }
    Ok(())
}

fn parse_datetime(id: &str, s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // Rows written by hand with datetime('now') use "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
                .unwrap_or_else(|_| {
                    warn!(id, raw = %s, "unreadable applied_at; listing it as the epoch");
                    DateTime::<Utc>::UNIX_EPOCH
                })
        })
}
