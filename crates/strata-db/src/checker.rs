use rusqlite::Connection;
use strata_common::{MigrationError, Result};
use tracing::warn;

use crate::applied_store::AppliedStore;
use crate::registry::Registry;

/// Verifies that the applied-state table exists and agrees with the registry.
///
/// Problems are reported, never repaired: rewriting bookkeeping rows without
/// knowing the real schema state risks losing data.
pub struct IntegrityChecker<'a> {
    registry: &'a Registry,
    store: &'a AppliedStore,
}

impl<'a> IntegrityChecker<'a> {
    pub fn new(registry: &'a Registry, store: &'a AppliedStore) -> Self {
        Self { registry, store }
    }

    /// Create the applied-state table on a fresh database. Returns `true` if it
    /// had to be created.
    pub fn bootstrap(&self, conn: &Connection) -> Result<bool> {
        self.store.ensure_table(conn)
    }

    /// Read applied ids and fail with the first integrity problem found. All
    /// problems are logged. On success returns the applied ids, ascending.
    pub fn verify(&self, conn: &Connection) -> Result<Vec<String>> {
        let applied = self.store.list_applied(conn)?;
        let issues = scan(self.registry, &applied);
        for issue in &issues {
            warn!("migration state check failed: {issue}");
        }
        match issues.into_iter().next() {
            Some(issue) => Err(issue.into()),
            None => Ok(applied),
        }
    }
}

/// Compare `applied` (ascending) against the registry order.
///
/// Every applied id must be a registry entry, and the known applied ids must
/// be exactly the first `n` registry entries.
pub fn scan(registry: &Registry, applied: &[String]) -> Vec<MigrationError> {
    let mut issues: Vec<MigrationError> = applied
        .iter()
        .filter(|id| !registry.contains(id))
        .map(|id| MigrationError::OrphanedMigration { id: id.clone() })
        .collect();

    let is_applied = |id: &str| applied.iter().any(|a| a == id);
    let first_gap = registry.iter().position(|m| !is_applied(m.id));
    if let Some(gap) = first_gap {
        let later = registry.migrations()[gap + 1..]
            .iter()
            .find(|m| is_applied(m.id));
        if let Some(later) = later {
            issues.push(MigrationError::NonContiguousState {
                missing: registry.migrations()[gap].id.to_string(),
                applied: later.id.to_string(),
            });
        }
    }

    issues
}
