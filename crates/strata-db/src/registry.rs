use std::collections::HashSet;

use strata_common::{Direction, MigrationError};

/// A single reversible schema change.
///
/// `id` is both the primary key in the applied-state table and the total order
/// in which migrations run; ids are timestamp-prefixed by convention so that
/// lexicographic order matches authoring order. Once shipped, an entry must
/// never change: databases elsewhere may already record it as applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static [&'static str],
    pub down: &'static [&'static str],
}

impl Migration {
    pub fn script(&self, direction: Direction) -> &'static [&'static str] {
        match direction {
            Direction::Up => self.up,
            Direction::Down => self.down,
        }
    }
}

/// Validated, id-ordered catalog of migrations.
#[derive(Debug, Clone)]
pub struct Registry {
    migrations: Vec<Migration>,
}

impl Registry {
    /// Sort `migrations` by id and validate them. Rejects duplicate ids and
    /// empty (or blank) scripts in either direction.
    pub fn new(migrations: impl IntoIterator<Item = Migration>) -> Result<Self, MigrationError> {
        let mut migrations: Vec<Migration> = migrations.into_iter().collect();
        migrations.sort_by(|a, b| a.id.cmp(b.id));

        let mut seen = HashSet::with_capacity(migrations.len());
        for migration in &migrations {
            if !seen.insert(migration.id) {
                return Err(MigrationError::DuplicateId {
                    id: migration.id.to_string(),
                });
            }
            for direction in [Direction::Up, Direction::Down] {
                let script = migration.script(direction);
                if script.is_empty() || script.iter().any(|s| s.trim().is_empty()) {
                    return Err(MigrationError::EmptyScript {
                        id: migration.id.to_string(),
                        direction,
                    });
                }
            }
        }

        Ok(Self { migrations })
    }

    /// The application's compiled-in schema history.
    pub fn builtin() -> Result<Self, MigrationError> {
        Self::new(crate::migrations::ALL.iter().copied())
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Migration> {
        self.migrations.iter()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Migration> {
        self.migrations
            .binary_search_by(|m| m.id.cmp(id))
            .ok()
            .map(|idx| &self.migrations[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// The highest-ordered migration.
    pub fn latest(&self) -> Option<&Migration> {
        self.migrations.last()
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a Migration;
    type IntoIter = std::slice::Iter<'a, Migration>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Migration = Migration {
        id: "20240101000000_a",
        up: &["CREATE TABLE a (id INTEGER)"],
        down: &["DROP TABLE a"],
    };
    const B: Migration = Migration {
        id: "20240102000000_b",
        up: &["CREATE TABLE b (id INTEGER)"],
        down: &["DROP TABLE b"],
    };
    const C: Migration = Migration {
        id: "20240103000000_c",
        up: &["CREATE TABLE c (id INTEGER)"],
        down: &["DROP TABLE c"],
    };

    #[test]
    fn sorts_by_id() {
        let registry = Registry::new([C, A, B]).unwrap();
        let ids: Vec<_> = registry.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![A.id, B.id, C.id]);
        assert_eq!(registry.latest().map(|m| m.id), Some(C.id));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let dup = Migration {
            up: &["CREATE TABLE other (id INTEGER)"],
            ..B
        };
        let err = Registry::new([A, B, dup]).unwrap_err();
        assert_eq!(err, MigrationError::DuplicateId { id: B.id.into() });
    }

    #[test]
    fn rejects_empty_scripts() {
        let no_up = Migration { up: &[], ..A };
        assert_eq!(
            Registry::new([no_up]).unwrap_err(),
            MigrationError::EmptyScript {
                id: A.id.into(),
                direction: Direction::Up
            }
        );

        let no_down = Migration { down: &[], ..A };
        assert_eq!(
            Registry::new([no_down]).unwrap_err(),
            MigrationError::EmptyScript {
                id: A.id.into(),
                direction: Direction::Down
            }
        );
    }

    #[test]
    fn rejects_blank_statements() {
        let blank = Migration {
            down: &["DROP TABLE a", "   "],
            ..A
        };
        assert!(matches!(
            Registry::new([blank]),
            Err(MigrationError::EmptyScript { .. })
        ));
    }

    #[test]
    fn lookup_by_id() {
        let registry = Registry::new([A, B]).unwrap();
        assert_eq!(registry.get(B.id), Some(&B));
        assert!(registry.contains(A.id));
        assert!(!registry.contains(C.id));
    }

    #[test]
    fn empty_registry_is_valid() {
        let registry = Registry::new(Vec::<Migration>::new()).unwrap();
        assert!(registry.is_empty());
        assert!(registry.latest().is_none());
    }

    #[test]
    fn builtin_registry_validates() {
        let registry = Registry::builtin().unwrap();
        assert_eq!(registry.len(), crate::migrations::ALL.len());
    }
}
