//! Configuration management with YAML support

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::event::WallClock;
use crate::import::ImportOptions;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    /// IANA zone used to render local times
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// Import behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// How naive `endTime` values of legacy exports are read
    #[serde(default = "default_legacy_wall_clock")]
    pub legacy_wall_clock: WallClock,

    #[serde(default)]
    pub min_ms_played: u64,

    #[serde(default)]
    pub follow_links: bool,
}

/// Report rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_top_artists")]
    pub top_artists: usize,
}

// Default value functions
fn default_database_path() -> String {
    "~/.local/share/listenlog/listenlog.db".to_string()
}

fn default_timezone() -> String {
    "Europe/Paris".to_string()
}

fn default_legacy_wall_clock() -> WallClock {
    WallClock::Local
}

fn default_top_artists() -> usize {
    15
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            legacy_wall_clock: default_legacy_wall_clock(),
            min_ms_played: 0,
            follow_links: false,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_artists: default_top_artists(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            timezone: default_timezone(),
            import: ImportConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./listenlog.yaml (current directory)
    /// 3. ~/.config/listenlog/listenlog.yaml
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let search_paths = vec![
            shellexpand::tilde(path).to_string(),
            "listenlog.yaml".to_string(),
            shellexpand::tilde("~/.config/listenlog/listenlog.yaml").to_string(),
        ];

        for search_path in &search_paths {
            let candidate = PathBuf::from(search_path);
            if candidate.exists() {
                let content =
                    std::fs::read_to_string(&candidate).map_err(|source| ConfigError::Read {
                        path: candidate.clone(),
                        source,
                    })?;
                let config: Config =
                    serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                        path: candidate.clone(),
                        source,
                    })?;
                tracing::debug!(path = %candidate.display(), "loaded config");
                return Ok(config);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    /// Get the database path, expanding ~ to home directory
    pub fn database_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.database.path).to_string();
        PathBuf::from(expanded)
    }

    /// Resolve the configured zone name
    pub fn zone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::UnknownTimezone {
                name: self.timezone.clone(),
                reason: e.to_string(),
            })
    }

    pub fn import_options(&self) -> Result<ImportOptions, ConfigError> {
        Ok(ImportOptions {
            zone: self.zone()?,
            legacy_wall_clock: self.import.legacy_wall_clock,
            min_ms_played: self.import.min_ms_played,
            follow_links: self.import.follow_links,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.zone().unwrap(), chrono_tz::Europe::Paris);
        assert_eq!(config.import.legacy_wall_clock, WallClock::Local);
        assert_eq!(config.report.top_artists, 15);
    }

    #[test]
    fn test_unknown_timezone() {
        let config = Config {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.import_options(),
            Err(ConfigError::UnknownTimezone { .. })
        ));
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
database:
  path: ~/.local/share/listenlog/test.db

timezone: America/New_York

import:
  legacy_wall_clock: utc
  min_ms_played: 30000
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.database.path, "~/.local/share/listenlog/test.db");

        let options = config.import_options().unwrap();
        assert_eq!(options.zone, chrono_tz::America::New_York);
        assert_eq!(options.legacy_wall_clock, WallClock::Utc);
        assert_eq!(options.min_ms_played, 30000);
        assert!(!options.follow_links);
        assert_eq!(config.report.top_artists, 15);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.timezone, "Europe/Paris");
    }
}
