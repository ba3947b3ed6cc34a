use rusqlite::Connection;
use strata_common::Result;
use strata_config::AppConfig;
use tracing::info;

use crate::applied_store::AppliedStore;
use crate::connection;
use crate::registry::Registry;
use crate::runner::MigrationRunner;

/// Open the application database and bring it to the latest schema.
///
/// Hosts call this once at startup before any other database access and must
/// refuse to continue if it fails: the schema is then at the last migration
/// that committed, which the rest of the application does not expect.
pub fn open_migrated(config: &AppConfig) -> Result<Connection> {
    let registry = Registry::builtin()?;
    let store = AppliedStore::new(config.migrations.table.as_str())?;

    let db_path = config.database.resolved_path();
    let mut conn = connection::open(&db_path, &config.database)?;

    let report = MigrationRunner::new(&registry)
        .with_store(store)
        .ensure_latest(&mut conn)?;
    info!(
        "database at {} is up to date ({} migration(s) applied)",
        db_path.display(),
        report.completed.len()
    );
    Ok(conn)
}
