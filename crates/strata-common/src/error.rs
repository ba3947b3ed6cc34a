use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// The migration failure behind this error, if any.
    pub fn as_migration(&self) -> Option<&MigrationError> {
        match self {
            Error::Migration(e) => Some(e),
            _ => None,
        }
    }
}

/// Which way a migration script moves the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

/// Failures raised by the registry, the integrity checker and the runner.
///
/// Registry validation errors (`DuplicateId`, `EmptyScript`) are fatal at load.
/// Integrity errors (`OrphanedMigration`, `NonContiguousState`) are reported by
/// `status` and block `up`/`down` until an operator repairs the state.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MigrationError {
    #[error("duplicate migration id in registry: {id}")]
    DuplicateId { id: String },

    #[error("migration {id} has an empty {direction} script")]
    EmptyScript { id: String, direction: Direction },

    #[error("applied migration {id} is not in the registry")]
    OrphanedMigration { id: String },

    #[error(
        "applied state is not contiguous: {missing} is not applied but later migration {applied} is"
    )]
    NonContiguousState { missing: String, applied: String },

    #[error("migration {id} failed: {cause}")]
    MigrationFailed { id: String, cause: String },

    #[error("unknown target migration: {id}")]
    UnknownTarget { id: String },
}

impl MigrationError {
    /// Whether this error describes drift between applied state and the registry.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            MigrationError::OrphanedMigration { .. } | MigrationError::NonContiguousState { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_context() {
        let e = Error::Config("bad yaml".into());
        assert_eq!(e.to_string(), "configuration error: bad yaml");

        let e = Error::Database("locked".into());
        assert_eq!(e.to_string(), "database error: locked");

        let e = Error::Other("misc".into());
        assert_eq!(e.to_string(), "misc");
    }

    #[test]
    fn migration_errors_display_transparently() {
        let e: Error = MigrationError::MigrationFailed {
            id: "20240101_a".into(),
            cause: "no such table: t".into(),
        }
        .into();
        assert_eq!(
            e.to_string(),
            "migration 20240101_a failed: no such table: t"
        );
        assert!(e.as_migration().is_some());

        let e = MigrationError::EmptyScript {
            id: "1".into(),
            direction: Direction::Down,
        };
        assert_eq!(e.to_string(), "migration 1 has an empty down script");
    }

    #[test]
    fn integrity_classification() {
        assert!(MigrationError::OrphanedMigration { id: "x".into() }.is_integrity());
        assert!(
            MigrationError::NonContiguousState {
                missing: "a".into(),
                applied: "b".into()
            }
            .is_integrity()
        );
        assert!(!MigrationError::UnknownTarget { id: "x".into() }.is_integrity());
    }

    #[test]
    fn migration_error_serializes_with_kind_tag() {
        let json = serde_json::to_value(MigrationError::OrphanedMigration { id: "7".into() })
            .unwrap();
        assert_eq!(json["kind"], "orphaned_migration");
        assert_eq!(json["id"], "7");

        let json = serde_json::to_string(&Direction::Down).unwrap();
        assert_eq!(json, r#""down""#);
    }
}
