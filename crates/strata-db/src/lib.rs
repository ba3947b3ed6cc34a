pub mod applied_store;
pub mod checker;
pub mod connection;
pub mod migrations;
pub mod registry;
pub mod runner;
pub mod startup;

pub use applied_store::{AppliedMigration, AppliedStore};
pub use checker::IntegrityChecker;
pub use registry::{Migration, Registry};
pub use runner::{MigrationRunner, MigrationStatus, RunReport, StatusReport};
pub use startup::open_migrated;
