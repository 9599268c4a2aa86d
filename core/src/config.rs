//! Configuration for kill escalation and scan concurrency.
//!
//! Read from `~/.portkiller/config.json` when present. The file is only ever
//! read; a missing file yields the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{Error, Result};

/// Configuration data stored in JSON format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Termination policy.
    #[serde(default)]
    pub kill: KillPolicy,

    /// Scan settings.
    #[serde(default)]
    pub scan: ScanSettings,
}

/// How a PID is terminated.
///
/// The graceful signal goes first. With `escalate`, a process still running
/// after `grace_period_ms` receives the forceful signal. With `force`, the
/// forceful signal is sent straight away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KillPolicy {
    #[serde(default = "default_grace_period_ms", alias = "grace_period_ms")]
    pub grace_period_ms: u64,

    #[serde(default = "default_poll_interval_ms", alias = "poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_true")]
    pub escalate: bool,

    #[serde(default)]
    pub force: bool,

    /// Concurrent terminations per batch.
    #[serde(default = "default_max_workers", alias = "max_workers")]
    pub max_workers: usize,
}

/// Per-scan resolution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScanSettings {
    /// Concurrent PID resolutions per scan.
    #[serde(default = "default_max_workers", alias = "max_workers")]
    pub max_workers: usize,
}

fn default_grace_period_ms() -> u64 {
    500
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_max_workers() -> usize {
    8
}

fn default_true() -> bool {
    true
}

impl Default for KillPolicy {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            escalate: true,
            force: false,
            max_workers: default_max_workers(),
        }
    }
}

impl KillPolicy {
    /// Policy that skips the graceful phase.
    pub fn forceful() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Poll interval, never zero.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Worker count, never zero.
    pub fn workers(&self) -> usize {
        self.max_workers.max(1)
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
        }
    }
}

impl ScanSettings {
    /// Worker count, never zero.
    pub fn workers(&self) -> usize {
        self.max_workers.max(1)
    }
}

/// Configuration store.
///
/// Reads configuration from `~/.portkiller/config.json` or a custom path.
pub struct ConfigStore {
    /// Path to the configuration file.
    config_path: PathBuf,
}

impl ConfigStore {
    /// Create a new config store with the default path.
    ///
    /// Default path: `~/.portkiller/config.json`
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

        Ok(Self {
            config_path: home.join(".portkiller").join("config.json"),
        })
    }

    /// Create a config store with a custom path.
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Path of the configuration file.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from disk.
    ///
    /// Returns default config if the file doesn't exist.
    pub async fn load(&self) -> Result<Config> {
        let content = match fs::read_to_string(&self.config_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.config_path.display(), "No config file, using defaults");
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(Error::Config(format!(
                    "Failed to read {}: {}",
                    self.config_path.display(),
                    e
                )))
            }
        };

        serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse {}: {}",
                self.config_path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::with_path(dir.path().join("config.json"));

        let config = store.load().await.unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.kill.grace_period(), Duration::from_millis(500));
        assert!(config.kill.escalate);
        assert!(!config.kill.force);
    }

    #[tokio::test]
    async fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"kill":{"gracePeriodMs":2000,"force":true}}"#).unwrap();

        let config = ConfigStore::with_path(&path).load().await.unwrap();
        assert_eq!(config.kill.grace_period_ms, 2000);
        assert!(config.kill.force);
        assert_eq!(config.kill.poll_interval_ms, 50);
        assert_eq!(config.scan.max_workers, 8);
    }

    #[tokio::test]
    async fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            ConfigStore::with_path(&path).load().await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_snake_case_keys_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"kill":{"grace_period_ms":2000,"max_workers":2},"scan":{"max_workers":3}}"#,
        )
        .unwrap();

        let config = ConfigStore::with_path(&path).load().await.unwrap();
        assert_eq!(config.kill.grace_period(), Duration::from_millis(2000));
        assert_eq!(config.kill.workers(), 2);
        assert_eq!(config.scan.workers(), 3);
    }

    #[tokio::test]
    async fn test_unknown_key_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"kill":{"gracePeriod":2000}}"#).unwrap();

        match ConfigStore::with_path(&path).load().await {
            Err(Error::Config(msg)) => assert!(msg.contains("gracePeriod")),
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_workers_clamped() {
        let settings = ScanSettings { max_workers: 0 };
        assert_eq!(settings.workers(), 1);

        let policy = KillPolicy {
            max_workers: 0,
            poll_interval_ms: 0,
            ..KillPolicy::default()
        };
        assert_eq!(policy.workers(), 1);
        assert_eq!(policy.poll_interval(), Duration::from_millis(1));
    }
}
