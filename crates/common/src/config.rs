//! Application configuration.
//!
//! These are the persisted defaults read from
//! `$XDG_CONFIG_HOME/vfs/config.json`. Per-run settings come from the command
//! line and override whatever is stored here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default analysis exchange settings.
    pub analysis: AnalysisDefaults,

    /// Default message broker settings.
    pub broker: BrokerDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default analysis exchange parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisDefaults {
    /// Seconds to wait for an analysis result.
    pub timeout_secs: f64,

    /// Seconds between checks for a result file.
    pub poll_interval_secs: f64,
}

/// Default message broker parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerDefaults {
    /// Connection URL, e.g. `redis://localhost:6379/0`.
    pub url: String,

    /// Channel frames are published on.
    pub channel_out: String,

    /// Channel analysis results arrive on.
    pub channel_in: String,

    /// Seconds to wait for a reply.
    pub timeout_secs: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "vfs=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisDefaults::default(),
            broker: BrokerDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for AnalysisDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: 10.0,
            poll_interval_secs: 0.1,
        }
    }
}

impl Default for BrokerDefaults {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            channel_out: "images".to_string(),
            channel_in: "predictions".to_string(),
            timeout_secs: 10.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &std::path::Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let config_path = config_file_path();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save config to an explicit path, creating parent directories.
    pub fn save_to(&self, config_path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("vfs").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("vfs_test_config_missing/config.json");
        let config = AppConfig::load_from(&path);
        assert_eq!(config.analysis.timeout_secs, 10.0);
        assert_eq!(config.broker.url, "redis://localhost:6379/0");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = std::env::temp_dir().join("vfs_test_config_partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{"analysis": {"timeout_secs": 2.5}}"#).unwrap();

        let config = AppConfig::load_from(&path);
        assert_eq!(config.analysis.timeout_secs, 2.5);
        assert_eq!(config.analysis.poll_interval_secs, 0.1);
        assert_eq!(config.broker.channel_in, "predictions");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_save_then_load() {
        let dir = std::env::temp_dir().join("vfs_test_config_save");
        let path = dir.join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.broker.url = "redis://broker:6380/1".to_string();
        config.analysis.timeout_secs = 4.0;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.broker.url, "redis://broker:6380/1");
        assert_eq!(loaded.analysis.timeout_secs, 4.0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_invalid_file_uses_defaults() {
        let dir = std::env::temp_dir().join("vfs_test_config_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, "not json").unwrap();

        let config = AppConfig::load_from(&path);
        assert!(!config.logging.json);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
