use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use strata_common::{Error, Result};
use strata_config::DatabaseConfig;
use tracing::info;

/// Open (creating if needed) the database file at `db_path` with the
/// connection settings from `config`.
pub fn open(db_path: &Path, config: &DatabaseConfig) -> Result<Connection> {
    info!("opening database at {}", db_path.display());
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(db_path)
        .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

    conn.execute_batch("PRAGMA journal_mode=WAL;")
        .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;
    configure(&conn, config)?;
    Ok(conn)
}

pub fn open_in_memory(config: &DatabaseConfig) -> Result<Connection> {
    let conn = Connection::open_in_memory()
        .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;
    configure(&conn, config)?;
    Ok(conn)
}

fn configure(conn: &Connection, config: &DatabaseConfig) -> Result<()> {
    let foreign_keys = if config.foreign_keys { "ON" } else { "OFF" };
    conn.execute_batch(&format!("PRAGMA foreign_keys={foreign_keys};"))
        .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|e| Error::Database(format!("failed to set busy timeout: {e}")))?;
    Ok(())
}
