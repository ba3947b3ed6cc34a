use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use strata_common::{Direction, MigrationError, Result};
use tracing::{debug, info, warn};

use crate::applied_store::AppliedStore;
use crate::checker::{self, IntegrityChecker};
use crate::registry::{Migration, Registry};

/// Applies and reverts registry migrations against a connection.
///
/// Every migration runs in its own `IMMEDIATE` transaction together with the
/// bookkeeping write, so a failure leaves both the schema and the applied-state
/// table exactly as they were before that migration started. The runner stops
/// at the first failure.
pub struct MigrationRunner<'r> {
    registry: &'r Registry,
    store: AppliedStore,
    cancel: Option<Arc<AtomicBool>>,
    bootstrapped: bool,
}

/// Applied state of one registry entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationStatus {
    pub id: String,
    pub applied: bool,
    pub applied_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub migrations: Vec<MigrationStatus>,
    /// Orphaned or non-contiguous applied state. Reported, never repaired.
    pub issues: Vec<MigrationError>,
}

impl StatusReport {
    pub fn pending(&self) -> impl Iterator<Item = &MigrationStatus> {
        self.migrations.iter().filter(|m| !m.applied)
    }

    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Outcome of an `up` or `down` run that did not fail.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub direction: Direction,
    /// Ids that committed, in execution order.
    pub completed: Vec<String>,
    /// Set when the cancellation flag stopped the run between migrations.
    pub interrupted: bool,
}

impl<'r> MigrationRunner<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            store: AppliedStore::default(),
            cancel: None,
            bootstrapped: false,
        }
    }

    pub fn with_store(mut self, store: AppliedStore) -> Self {
        self.store = store;
        self
    }

    /// Checked before each migration's transaction. Setting it stops a run at
    /// the next migration boundary; an in-flight transaction always finishes.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn store(&self) -> &AppliedStore {
        &self.store
    }

    fn checker(&self) -> IntegrityChecker<'_> {
        IntegrityChecker::new(self.registry, &self.store)
    }

    fn bootstrap(&mut self, conn: &Connection) -> Result<()> {
        if !self.bootstrapped {
            self.checker().bootstrap(conn)?;
            self.bootstrapped = true;
        }
        Ok(())
    }

    /// Applied state of every registry entry plus any integrity issues. Never
    /// fails because of drift.
    pub fn status(&mut self, conn: &Connection) -> Result<StatusReport> {
        self.bootstrap(conn)?;
        let records = self.store.list_records(conn)?;
        let applied: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let issues = checker::scan(self.registry, &applied);

        let migrations = self
            .registry
            .iter()
            .map(|m| {
                let record = records.iter().find(|r| r.id == m.id);
                MigrationStatus {
                    id: m.id.to_string(),
                    applied: record.is_some(),
                    applied_at: record.map(|r| r.applied_at),
                }
            })
            .collect();

        Ok(StatusReport { migrations, issues })
    }

    /// Migrations `up(target)` would apply, in order.
    pub fn plan_up(
        &mut self,
        conn: &Connection,
        target: Option<&str>,
    ) -> Result<Vec<&'r Migration>> {
        self.bootstrap(conn)?;
        let applied = self.checker().verify(conn)?;
        let target = self.resolve_target(target)?;
        let highest = applied.last().map(String::as_str);

        let registry = self.registry;
        let plan: Vec<&'r Migration> = registry
            .iter()
            .filter(|m| highest.is_none_or(|h| m.id > h))
            .filter(|m| target.is_none_or(|t| m.id <= t))
            .collect();
        debug!("planned {} migration(s) up", plan.len());
        Ok(plan)
    }

    /// Migrations `down(target)` would revert, in order (newest first).
    pub fn plan_down(
        &mut self,
        conn: &Connection,
        target: Option<&str>,
    ) -> Result<Vec<&'r Migration>> {
        self.bootstrap(conn)?;
        let applied = self.checker().verify(conn)?;
        let target = self.resolve_target(target)?;

        let registry = self.registry;
        let plan: Vec<&'r Migration> = applied
            .iter()
            .rev()
            .filter(|id| target.is_none_or(|t| id.as_str() > t))
            .filter_map(|id| registry.get(id))
            .collect();
        debug!("planned {} migration(s) down", plan.len());
        Ok(plan)
    }

    /// Apply pending migrations up to and including `target` (default: the
    /// latest registry entry).
    pub fn up(&mut self, conn: &mut Connection, target: Option<&str>) -> Result<RunReport> {
        let plan = self.plan_up(conn, target)?;
        self.run(conn, plan, Direction::Up)
    }

    /// Revert applied migrations newer than `target`. Without a target every
    /// applied migration is reverted.
    pub fn down(&mut self, conn: &mut Connection, target: Option<&str>) -> Result<RunReport> {
        let plan = self.plan_down(conn, target)?;
        self.run(conn, plan, Direction::Down)
    }

    /// Bring the database to the latest schema. The single call a host makes at
    /// startup before touching the database.
    pub fn ensure_latest(&mut self, conn: &mut Connection) -> Result<RunReport> {
        self.up(conn, None)
    }

    fn resolve_target<'t>(&self, target: Option<&'t str>) -> Result<Option<&'t str>> {
        match target {
            Some(id) if !self.registry.contains(id) => {
                Err(MigrationError::UnknownTarget { id: id.to_string() }.into())
            }
            other => Ok(other),
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn run(
        &self,
        conn: &mut Connection,
        plan: Vec<&'r Migration>,
        direction: Direction,
    ) -> Result<RunReport> {
        let mut report = RunReport {
            direction,
            ..Default::default()
        };

        for migration in plan {
            if self.cancelled() {
                warn!(
                    "migration run interrupted before {} ({} completed)",
                    migration.id,
                    report.completed.len()
                );
                report.interrupted = true;
                break;
            }

            if let Err(e) = self.execute(conn, migration, direction) {
                warn!(
                    "migration {} ({direction}) rolled back after {} completed: {e}",
                    migration.id,
                    report.completed.len()
                );
                return Err(e.into());
            }

            match direction {
                Direction::Up => info!(id = migration.id, "applied migration"),
                Direction::Down => info!(id = migration.id, "reverted migration"),
            }
            report.completed.push(migration.id.to_string());
        }

        Ok(report)
    }

    /// Run one migration script and its bookkeeping write in a single
    /// transaction. Dropping the transaction on any error rolls both back.
    fn execute(
        &self,
        conn: &mut Connection,
        migration: &Migration,
        direction: Direction,
    ) -> std::result::Result<(), MigrationError> {
        let failed = |cause: String| MigrationError::MigrationFailed {
            id: migration.id.to_string(),
            cause,
        };

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| failed(format!("failed to begin transaction: {e}")))?;

        for statement in migration.script(direction) {
            debug!(id = migration.id, "executing: {statement}");
            tx.execute_batch(statement)
                .map_err(|e| failed(e.to_string()))?;
        }

        let recorded = match direction {
            Direction::Up => self.store.record_applied(&tx, migration.id),
            Direction::Down => self.store.record_reverted(&tx, migration.id),
        };
        recorded.map_err(|e| failed(e.to_string()))?;

        tx.commit()
            .map_err(|e| failed(format!("failed to commit: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Migration = Migration {
        id: "a",
        up: &["CREATE TABLE a (id INTEGER)"],
        down: &["DROP TABLE a"],
    };
    const B: Migration = Migration {
        id: "b",
        up: &["CREATE TABLE b (id INTEGER)"],
        down: &["DROP TABLE b"],
    };

    #[test]
    fn plans_respect_target() {
        let registry = Registry::new([A, B]).unwrap();
        let mut conn = Connection::open_in_memory().unwrap();
        let mut runner = MigrationRunner::new(&registry);

        let plan = runner.plan_up(&conn, Some("a")).unwrap();
        assert_eq!(plan, vec![&A]);

        runner.ensure_latest(&mut conn).unwrap();
        let plan = runner.plan_down(&conn, Some("a")).unwrap();
        assert_eq!(plan, vec![&B]);
        let plan = runner.plan_down(&conn, None).unwrap();
        assert_eq!(plan, vec![&B, &A]);
    }

    #[test]
    fn unknown_target_is_rejected() {
        let registry = Registry::new([A]).unwrap();
        let mut conn = Connection::open_in_memory().unwrap();
        let mut runner = MigrationRunner::new(&registry);

        let err = runner.up(&mut conn, Some("zzz")).unwrap_err();
        assert_eq!(
            err.as_migration(),
            Some(&MigrationError::UnknownTarget { id: "zzz".into() })
        );
        let err = runner.down(&mut conn, Some("zzz")).unwrap_err();
        assert!(err.as_migration().is_some());
    }

    #[test]
    fn target_below_applied_is_a_no_op() {
        let registry = Registry::new([A, B]).unwrap();
        let mut conn = Connection::open_in_memory().unwrap();
        let mut runner = MigrationRunner::new(&registry);

        runner.ensure_latest(&mut conn).unwrap();
        let report = runner.up(&mut conn, Some("a")).unwrap();
        assert!(report.completed.is_empty());
        assert_eq!(
            runner.store().list_applied(&conn).unwrap(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn cancel_flag_stops_between_migrations() {
        let registry = Registry::new([A, B]).unwrap();
        let mut conn = Connection::open_in_memory().unwrap();
        let flag = Arc::new(AtomicBool::new(true));
        let mut runner = MigrationRunner::new(&registry).with_cancel_flag(Arc::clone(&flag));

        let report = runner.ensure_latest(&mut conn).unwrap();
        assert!(report.interrupted);
        assert!(report.completed.is_empty());

        flag.store(false, Ordering::SeqCst);
        let report = runner.ensure_latest(&mut conn).unwrap();
        assert!(!report.interrupted);
        assert_eq!(report.completed, vec!["a", "b"]);
    }

    #[test]
    fn status_lists_applied_timestamps() {
        let registry = Registry::new([A, B]).unwrap();
        let mut conn = Connection::open_in_memory().unwrap();
        let mut runner = MigrationRunner::new(&registry);

        runner.up(&mut conn, Some("a")).unwrap();
        let status = runner.status(&conn).unwrap();
        assert!(status.is_consistent());
        assert!(status.migrations[0].applied);
        assert!(status.migrations[0].applied_at.is_some());
        assert!(status.migrations[1].applied_at.is_none());
        assert_eq!(status.pending().count(), 1);
    }
}
