//! On-disk configuration.
//!
//! `hopper init` writes `.hopper/config.json` into the watched directory;
//! `hopper watch` reads it back and lets command-line flags override it.

use crate::error::{Result, WatchError};
use crate::target::WatchTarget;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory holding hopper's own files inside a watched directory.
pub const CONFIG_DIR: &str = ".hopper";

/// Config file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.json";

/// How the watcher decides when to look at the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// Re-list the directory on a timer.
    #[default]
    Polling,
    /// Listen for OS notifications, resubscribing on a timer.
    Realtime,
}

impl std::fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerMode::Polling => write!(f, "polling"),
            TriggerMode::Realtime => write!(f, "realtime"),
        }
    }
}

/// Watcher settings as stored in `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Glob applied to file names, e.g. `*.csv`.
    pub filter: Option<String>,

    /// Skip files already present when the watcher starts.
    pub ignore_existing_on_start: bool,

    pub mode: TriggerMode,

    /// Polling interval, or resubscribe interval in realtime mode.
    pub interval_secs: u64,

    /// How often a locked file is re-probed.
    pub retry_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            filter: None,
            ignore_existing_on_start: false,
            mode: TriggerMode::Polling,
            interval_secs: 60,
            retry_interval_ms: 1000,
        }
    }
}

impl WatchConfig {
    /// Path of the config file for a watched directory.
    pub fn path_for(dir: &Path) -> PathBuf {
        dir.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Reads and validates a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| WatchError::io(path, e))?;
        let config: Self = serde_json::from_str(&text).map_err(|source| WatchError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config for `dir` if one exists, defaults otherwise.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = Self::path_for(dir);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Writes the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| WatchError::io(parent, e))?;
        }
        let text = serde_json::to_string_pretty(self).map_err(|source| WatchError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, text).map_err(|e| WatchError::io(path, e))
    }

    /// Rejects values that would make the watcher spin or never fire.
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(WatchError::Config("interval_secs must be at least 1".into()));
        }
        if self.retry_interval_ms == 0 {
            return Err(WatchError::Config(
                "retry_interval_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Builds the watch target for `dir` from these settings.
    pub fn target(&self, dir: impl Into<PathBuf>) -> Result<WatchTarget> {
        let target = WatchTarget::new(dir).ignore_existing_on_start(self.ignore_existing_on_start);
        match &self.filter {
            Some(pattern) => target.with_filter(pattern),
            None => Ok(target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = WatchConfig::path_for(dir.path());

        let config = WatchConfig {
            filter: Some("*.csv".into()),
            mode: TriggerMode::Realtime,
            interval_secs: 30,
            ..WatchConfig::default()
        };
        config.save(&path).unwrap();

        assert!(path.ends_with(".hopper/config.json"));
        assert_eq!(WatchConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "mode": "realtime" }"#).unwrap();

        let config = WatchConfig::load(&path).unwrap();
        assert_eq!(config.mode, TriggerMode::Realtime);
        assert_eq!(config.interval(), Duration::from_secs(60));
        assert_eq!(config.retry_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let config = WatchConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config, WatchConfig::default());
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "interval_secs": 0 }"#).unwrap();

        let err = WatchConfig::load(&path).unwrap_err();
        assert!(matches!(err, WatchError::Config(_)));
    }

    #[test]
    fn test_malformed_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            WatchConfig::load(&path).unwrap_err(),
            WatchError::Json { .. }
        ));
    }

    #[test]
    fn test_target_carries_filter() {
        let config = WatchConfig {
            filter: Some("*.xml".into()),
            ignore_existing_on_start: true,
            ..WatchConfig::default()
        };
        let target = config.target("/in").unwrap();
        assert!(target.ignores_existing());
        assert!(target.accepts(Path::new("/in/a.xml")));
        assert!(!target.accepts(Path::new("/in/a.csv")));
    }
}
