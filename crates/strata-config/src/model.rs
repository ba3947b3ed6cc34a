use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration, read from `config.yml` or `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub migrations: MigrationsConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file. Falls back to `~/.strata/data/strata.db`.
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    pub foreign_keys: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5_000,
            foreign_keys: true,
        }
    }
}

impl DatabaseConfig {
    /// The configured path, or the default location under the home directory.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| default_state_dir().join("data").join("strata.db"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    /// Name of the bookkeeping table holding applied migration ids.
    pub table: String,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            table: "_migrations".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// `~/.strata`, or `./.strata` when no home directory is known.
pub fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".strata")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = AppConfig::default();
        assert_eq!(config.migrations.table, "_migrations");
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert!(config.database.foreign_keys);
        assert_eq!(config.log.level, "info");
        assert!(!config.log.json);
    }

    #[test]
    fn resolved_path_prefers_explicit_path() {
        let db = DatabaseConfig {
            path: Some(PathBuf::from("/tmp/app.db")),
            ..Default::default()
        };
        assert_eq!(db.resolved_path(), PathBuf::from("/tmp/app.db"));

        let fallback = DatabaseConfig::default().resolved_path();
        assert!(fallback.ends_with("data/strata.db"));
    }
}
