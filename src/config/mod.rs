//! # Configuration Management Module
//!
//! Lifesim reads a single TOML file (default `lifesim.toml`) with three
//! sections:
//!
//! - [`StorageConfig`] - where the sled database lives
//! - [`LoggingConfig`] - log level and optional log file
//! - [`PrecheckConfig`] - windows and thresholds used by the consistency precheck
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lifesim::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("lifesim.toml").await?;
//!     let config = Config::load("lifesim.toml").await?;
//!     println!("Data dir: {}", config.storage.data_dir);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [storage]
//! data_dir = "./data/lifesim"
//!
//! [logging]
//! level = "info"
//! file = "lifesim.log"
//!
//! [precheck]
//! npc_scan_cap = 500
//! recent_window = 5
//! history_window = 50
//! conflict_threshold = 50
//! urgency_threshold = 70
//! ```
//!
//! The `[precheck]` section is optional; missing keys take the defaults shown.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::story::PrecheckPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub precheck: PrecheckConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl LoggingConfig {
    /// Configured level, falling back to `Info` for unrecognised names.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PrecheckConfig {
    /// Cap on NPCs loaded by the individuality and drama rules.
    pub npc_scan_cap: usize,
    /// Recent player entries a new turn must not repeat.
    pub recent_window: usize,
    /// Player entries searched for NPC knowledge and dramatic content.
    pub history_window: usize,
    /// Conflict level at which an NPC counts as dramatic.
    pub conflict_threshold: i64,
    /// Urgency a log entry must exceed to count as dramatic.
    pub urgency_threshold: i64,
}

impl Default for PrecheckConfig {
    fn default() -> Self {
        let policy = PrecheckPolicy::default();
        Self {
            npc_scan_cap: policy.npc_scan_cap,
            recent_window: policy.recent_window,
            history_window: policy.history_window,
            conflict_threshold: policy.conflict_threshold,
            urgency_threshold: policy.urgency_threshold,
        }
    }
}

impl PrecheckConfig {
    pub fn policy(&self) -> PrecheckPolicy {
        PrecheckPolicy {
            npc_scan_cap: self.npc_scan_cap,
            recent_window: self.recent_window,
            history_window: self.history_window,
            conflict_threshold: self.conflict_threshold,
            urgency_threshold: self.urgency_threshold,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig {
                data_dir: "./data/lifesim".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("lifesim.log".to_string()),
            },
            precheck: PrecheckConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_precheck_matches_policy_constants() {
        let config = Config::default();
        assert_eq!(config.precheck.policy(), PrecheckPolicy::default());
        assert_eq!(config.precheck.conflict_threshold, 50);
        assert_eq!(config.precheck.urgency_threshold, 70);
    }

    #[test]
    fn precheck_section_is_optional() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            data_dir = "/tmp/story"

            [logging]
            level = "debug"
            "#,
        )
        .expect("parse");
        assert_eq!(config.precheck, PrecheckConfig::default());
        assert_eq!(config.logging.level_filter(), log::LevelFilter::Debug);
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn partial_precheck_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            data_dir = "d"
            [logging]
            level = "loud"
            [precheck]
            npc_scan_cap = 10
            "#,
        )
        .expect("parse");
        assert_eq!(config.precheck.npc_scan_cap, 10);
        assert_eq!(config.precheck.history_window, 50);
        assert_eq!(config.logging.level_filter(), log::LevelFilter::Info);
    }

    #[tokio::test]
    async fn default_config_round_trips_through_file() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("lifesim.toml");
        let path = path.to_str().expect("utf-8 path");
        Config::create_default(path).await.expect("write");
        let loaded = Config::load(path).await.expect("load");
        assert_eq!(loaded.storage.data_dir, "./data/lifesim");
        assert_eq!(loaded.logging.file.as_deref(), Some("lifesim.log"));
    }
}
