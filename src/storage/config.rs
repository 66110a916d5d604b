// SQLite store configuration management

use crate::error::{AccessControlError, Result};
use crate::logging::LoggingSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Store configuration for SQLite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,

    /// Pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits on a locked database
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,

    /// Apply PRAGMA tuning on connect
    #[serde(default = "default_enable_optimizations")]
    pub enable_optimizations: bool,

    #[serde(default)]
    pub logging: Option<LoggingSettings>,
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_secs() -> u64 {
    30
}

fn default_enable_optimizations() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: None,
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout_secs(),
            enable_optimizations: default_enable_optimizations(),
            logging: None,
        }
    }
}

impl StoreConfig {
    /// Config with a custom database path
    pub fn with_db_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            sqlite_path: Some(path.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    /// Get SQLite database path
    pub fn get_sqlite_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.sqlite_path {
            Ok(path.clone())
        } else {
            // Default to data directory
            let mut data_dir = dirs::data_dir().ok_or_else(|| {
                AccessControlError::Config("Failed to get data directory".to_string())
            })?;
            data_dir.push("accesscontrol");
            data_dir.push("accesscontrol.db");
            Ok(data_dir)
        }
    }

    /// Database URL for SeaORM; the file is created when missing.
    pub fn database_url(&self) -> Result<String> {
        Ok(format!("sqlite:{}?mode=rwc", self.get_sqlite_path()?.display()))
    }

    pub fn logging_settings(&self) -> LoggingSettings {
        self.logging.clone().unwrap_or_default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(AccessControlError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        let _ = self.get_sqlite_path()?;
        Ok(())
    }
}

/// Store configuration manager
pub struct StoreConfigManager {
    config_path: PathBuf,
    config: StoreConfig,
}

impl StoreConfigManager {
    /// Config manager at `<config_dir>/accesscontrol/store.json`
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            AccessControlError::Config("Failed to get config directory".to_string())
        })?;
        Self::with_path(config_dir.join("accesscontrol").join("store.json"))
    }

    /// Config manager with a custom path; defaults apply when the file is missing.
    pub fn with_path(config_path: PathBuf) -> Result<Self> {
        let config = if config_path.exists() {
            Self::load_config(&config_path)?
        } else {
            StoreConfig::default()
        };
        config.validate()?;

        Ok(Self {
            config_path,
            config,
        })
    }

    fn load_config(path: &Path) -> Result<StoreConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AccessControlError::Config(format!("Failed to read store config {:?}: {}", path, e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            AccessControlError::Config(format!("Failed to parse store config {:?}: {}", path, e))
        })
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, content)?;

        tracing::info!("Store configuration saved to: {:?}", self.config_path);
        Ok(())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Apply `updater`, validate, then persist.
    pub fn update_config<F>(&mut self, updater: F) -> Result<()>
    where
        F: FnOnce(&mut StoreConfig),
    {
        let mut updated = self.config.clone();
        updater(&mut updated);
        updated.validate()?;
        self.config = updated;
        self.save()
    }

    /// Use `path` for this process only; nothing is written back.
    pub fn override_sqlite_path(&mut self, path: PathBuf) {
        self.config.sqlite_path = Some(path);
    }

    pub fn set_sqlite_path(&mut self, path: PathBuf) -> Result<()> {
        self.update_config(|config| {
            config.sqlite_path = Some(path);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: StoreConfig = serde_json::from_str(r#"{"sqlite_path": "/tmp/ac.db"}"#).unwrap();
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.busy_timeout_secs, 30);
        assert!(config.enable_optimizations);
        assert_eq!(config.database_url().unwrap(), "sqlite:/tmp/ac.db?mode=rwc");
    }

    #[test]
    fn test_missing_file_uses_defaults_and_save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let mut manager = StoreConfigManager::with_path(path.clone()).unwrap();
        assert_eq!(manager.config(), &StoreConfig::default());

        manager
            .set_sqlite_path(dir.path().join("permissions.db"))
            .unwrap();
        assert!(path.exists());

        let reloaded = StoreConfigManager::with_path(path).unwrap();
        assert_eq!(
            reloaded.config().sqlite_path,
            Some(dir.path().join("permissions.db"))
        );
    }

    #[test]
    fn test_invalid_update_is_not_applied() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = StoreConfigManager::with_path(dir.path().join("store.json")).unwrap();

        let err = manager
            .update_config(|config| config.max_connections = 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(manager.config().max_connections, 5);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = StoreConfigManager::with_path(path).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
