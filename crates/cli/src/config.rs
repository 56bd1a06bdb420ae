//! Configuration persistence
//!
//! TOML config under the platform config directory. A missing or
//! malformed file degrades to defaults with a log line; saving refuses
//! an invalid config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shuttersync_watcher::WatchConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory to watch and sync from
    pub source_directory: String,
    /// Sync destination
    pub destination_directory: String,

    /// Delete destination files absent from the source
    pub mirror_deletions: bool,
    /// Use the polling backend instead of native OS events
    pub use_polling: bool,
    /// Correct image extensions on the fly
    pub process_renames: bool,

    /// Quiet period before a sync triggers
    pub debounce_seconds: f64,
    /// Upper bound on sync delay under continuous activity
    pub max_latency_seconds: f64,
    /// Unconditional sync interval (0 disables)
    pub sync_rate_seconds: f64,

    /// File patterns excluded from sync
    pub exclude_files: Vec<String>,
    /// Directory names excluded from sync
    pub exclude_dirs: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_directory: String::new(),
            destination_directory: String::new(),
            mirror_deletions: false,
            use_polling: false,
            process_renames: true,
            debounce_seconds: 3.0,
            max_latency_seconds: 20.0,
            sync_rate_seconds: 0.0,
            exclude_files: vec!["*.tmp".to_string(), "*.bak".to_string(), "~*".to_string()],
            exclude_dirs: vec!["cache".to_string()],
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.source_directory.is_empty() && !Path::new(&self.source_directory).exists() {
            anyhow::bail!("Source directory not found: {}", self.source_directory);
        }
        if self.debounce_seconds < 0.0 {
            anyhow::bail!("debounce_seconds must be non-negative");
        }
        if self.max_latency_seconds < 0.0 {
            anyhow::bail!("max_latency_seconds must be non-negative");
        }
        if self.sync_rate_seconds < 0.0 {
            anyhow::bail!("sync_rate_seconds must be non-negative");
        }
        Ok(())
    }

    /// Timing policy and toggles for the watcher
    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            debounce: Duration::from_secs_f64(self.debounce_seconds),
            max_latency: Duration::from_secs_f64(self.max_latency_seconds),
            sync_rate: Duration::from_secs_f64(self.sync_rate_seconds),
            use_polling: self.use_polling,
            process_renames: self.process_renames,
        }
    }
}

/// Path of the config file under the platform config directory
pub fn config_file_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine config directory")?;
    Ok(base.join("shuttersync").join("config.toml"))
}

/// Load the config, falling back to defaults when missing or malformed
pub fn load() -> Result<AppConfig> {
    load_from(&config_file_path()?)
}

/// Validate and persist the config
pub fn save(config: &AppConfig) -> Result<()> {
    save_to(config, &config_file_path()?)
}

fn load_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        info!("Config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    match toml::from_str(&raw) {
        Ok(config) => Ok(config),
        Err(e) => {
            warn!("Failed to parse {}: {}; using defaults", path.display(), e);
            Ok(AppConfig::default())
        }
    }
}

fn save_to(config: &AppConfig, path: &Path) -> Result<()> {
    config.validate()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let serialized = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, serialized)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Configuration saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.debounce_seconds, 3.0);
        assert_eq!(config.max_latency_seconds, 20.0);
        assert_eq!(config.sync_rate_seconds, 0.0);
        assert!(config.process_renames);
        assert!(!config.mirror_deletions);
        config.validate().unwrap();
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/config.toml");

        let mut config = AppConfig::default();
        config.source_directory = temp_dir.path().to_string_lossy().into_owned();
        config.destination_directory = "/mnt/backup".to_string();
        config.debounce_seconds = 1.5;
        config.exclude_dirs = vec!["thumbs".to_string()];

        save_to(&config, &path).unwrap();
        let loaded = load_from(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = load_from(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, AppConfig::default());
    }

    #[test]
    fn test_malformed_file_loads_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "debounce_seconds = \"three\"").unwrap();

        let loaded = load_from(&path).unwrap();
        assert_eq!(loaded, AppConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "debounce_seconds = 7.5\n").unwrap();

        let loaded = load_from(&path).unwrap();
        assert_eq!(loaded.debounce_seconds, 7.5);
        assert_eq!(loaded.max_latency_seconds, 20.0);
    }

    #[test]
    fn test_save_refuses_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let config = AppConfig {
            debounce_seconds: -1.0,
            ..AppConfig::default()
        };

        assert!(save_to(&config, &path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_validate_rejects_missing_source() {
        let config = AppConfig {
            source_directory: "/definitely/not/a/real/dir".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_watch_config_conversion() {
        let config = AppConfig {
            debounce_seconds: 0.5,
            max_latency_seconds: 10.0,
            sync_rate_seconds: 2.0,
            use_polling: true,
            process_renames: false,
            ..AppConfig::default()
        };

        let watch = config.watch_config();
        assert_eq!(watch.debounce, Duration::from_millis(500));
        assert_eq!(watch.max_latency, Duration::from_secs(10));
        assert_eq!(watch.sync_rate, Duration::from_secs(2));
        assert!(watch.use_polling);
        assert!(!watch.process_renames);
    }
}
