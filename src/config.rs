use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::normalize::{Normalizer, DEFAULT_ENVIRONMENTS};

const APP_NAME: &str = "flagstore";
const DATABASE_FILE: &str = "flagstore.db";

/// Service configuration, loaded from an optional JSON file and then
/// overridden from environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file. Defaults to the platform data directory.
    pub database_path: Option<PathBuf>,
    /// Environments the deployment recognises (from FLAGSTORE_ENVIRONMENTS,
    /// comma-separated). Legacy records are upgraded into exactly these.
    pub environments: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            environments: DEFAULT_ENVIRONMENTS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from `path` (if given) and the process environment.
    /// A missing file yields the defaults; an unreadable one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Apply `FLAGSTORE_DATABASE` and `FLAGSTORE_ENVIRONMENTS` as returned by `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("FLAGSTORE_DATABASE").filter(|p| !p.trim().is_empty()) {
            self.database_path = Some(PathBuf::from(path));
        }

        if let Some(list) = lookup("FLAGSTORE_ENVIRONMENTS") {
            let environments: Vec<String> = list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !environments.is_empty() {
                self.environments = environments;
            }
        }
    }

    /// The configured database path, or `<data dir>/flagstore/flagstore.db`.
    pub fn resolve_database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        let dirs = directories::ProjectDirs::from("", "", APP_NAME)
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join(DATABASE_FILE))
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.environments.iter().cloned())
    }
}
