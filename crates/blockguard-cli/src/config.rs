//! Operator configuration file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use blockguard_core::DocumentStatus;
use blockguard_recovery::RecoverySettings;
use blockguard_scan::ScanSettings;
use serde::Deserialize;

/// Every field has a default, so an absent file and `{}` are equivalent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub batch_size: usize,
    pub time_budget_secs: u64,
    pub cache_ttl_secs: u64,
    pub statuses: Vec<DocumentStatus>,
    pub document_timeout_secs: u64,
    pub concurrency: usize,
    pub rules_path: Option<PathBuf>,
    pub registry_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: 50,
            time_budget_secs: 45,
            cache_ttl_secs: 3600,
            statuses: DocumentStatus::SCANNABLE.to_vec(),
            document_timeout_secs: 20,
            concurrency: 1,
            rules_path: None,
            registry_path: None,
        }
    }
}

impl Config {
    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = serde_json::from_str(&body)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        anyhow::ensure!(config.batch_size > 0, "batch_size must be positive");
        anyhow::ensure!(config.concurrency > 0, "concurrency must be positive");
        Ok(config)
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            batch_size: self.batch_size,
            time_budget: Duration::from_secs(self.time_budget_secs),
            statuses: self.statuses.clone(),
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
        }
    }

    pub fn recovery_settings(&self) -> RecoverySettings {
        RecoverySettings {
            concurrency: self.concurrency,
            document_timeout: Duration::from_secs(self.document_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_means_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.scan_settings().batch_size, 50);
        assert_eq!(config.recovery_settings().concurrency, 1);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blockguard.json");
        std::fs::write(&path, r#"{"time_budget_secs": 5, "statuses": ["publish"]}"#).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.time_budget_secs, 5);
        assert_eq!(config.statuses, vec![DocumentStatus::Published]);
        assert_eq!(config.document_timeout_secs, 20);
    }

    #[test]
    fn bad_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blockguard.json");

        std::fs::write(&path, r#"{"concurrency": 0}"#).unwrap();
        assert!(Config::load(Some(&path)).is_err());

        std::fs::write(&path, r#"{"batch": 10}"#).unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));

        assert!(Config::load(Some(&dir.path().join("absent.json"))).is_err());
    }
}
