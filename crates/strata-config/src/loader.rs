use std::path::{Path, PathBuf};

use strata_common::{Error, Result};
use tracing::{debug, info};

use crate::model::{AppConfig, default_state_dir};

const DEFAULT_FILE_NAMES: &[&str] = &["config.yml", "config.yaml", "config.toml"];

/// Locates and parses the configuration file.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from `path` if given, otherwise from the first default file found in
    /// `~/.strata`. Missing default files yield `AppConfig::default()`; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        match path {
            Some(path) => Self::load_file(path),
            None => match Self::find_default(&default_state_dir()) {
                Some(path) => Self::load_file(&path),
                None => {
                    debug!("no config file found, using defaults");
                    Ok(AppConfig::default())
                }
            },
        }
    }

    /// First of `config.yml`, `config.yaml`, `config.toml` present in `dir`.
    pub fn find_default(dir: &Path) -> Option<PathBuf> {
        DEFAULT_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
    }

    pub fn load_file(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let config = Self::parse(path, &contents)?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    fn parse(path: &Path, contents: &str) -> Result<AppConfig> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yml" | "yaml" => serde_yaml::from_str(contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}"))),
            "toml" => {
                toml::from_str(contents).map_err(|e| Error::Config(format!("TOML parse error: {e}")))
            }
            other => Err(Error::Config(format!(
                "unsupported config extension: {other}"
            ))),
        }
    }
}
