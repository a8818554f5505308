//! Prontu configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main Prontu configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Directory holding prontu.log
    #[serde(rename = "log-dir")]
    pub log_dir: PathBuf,

    /// Storage configuration
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        // ~/.local/share/prontu/logs on Linux
        let log_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("prontu")
            .join("logs");

        Self {
            log_level: None,
            log_dir,
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .prontu.yml
        let local_config = PathBuf::from(".prontu.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/prontu/prontu.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("prontu").join("prontu.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/prontu on Linux)
        let path = dirs::data_dir()
            .map(|d| d.join("prontu"))
            .unwrap_or_else(|| PathBuf::from(".prontu"))
            .join("prontu.db");

        Self { path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.log_level.is_none());
        assert!(config.log_dir.ends_with("logs"));
        assert!(config.storage.path.ends_with("prontu.db"));
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug
log-dir: /var/log/prontu

storage:
  path: /srv/prontu/tasks.db
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.log_dir, PathBuf::from("/var/log/prontu"));
        assert_eq!(config.storage.path, PathBuf::from("/srv/prontu/tasks.db"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
storage:
  path: here.db
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // Specified value
        assert_eq!(config.storage.path, PathBuf::from("here.db"));

        // Defaults for unspecified
        assert!(config.log_level.is_none());
        assert_eq!(config.log_dir, Config::default().log_dir);
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("prontu.yml");
        fs::write(&path, "log-level: warn\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("warn"));
    }

    #[test]
    fn test_load_explicit_path_errors_are_fatal() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.yml");
        assert!(Config::load(Some(&missing)).is_err());

        let broken = temp.path().join("broken.yml");
        fs::write(&broken, "storage: [not, a, map]\n").unwrap();
        assert!(Config::load(Some(&broken)).is_err());
    }
}
