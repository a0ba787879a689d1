use anyhow::{Context, Result, anyhow};
use chrono::NaiveTime;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::{error::WeatherError, provider::Endpoints};

pub const API_KEY_ENV: &str = "SKYCAST_API_KEY";
pub const DEFAULT_CITY: &str = "Amman";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_HOURLY_COUNT: usize = 12;
pub const DEFAULT_DAILY_ANCHOR: &str = "12:00:00";

/// Optional overrides for the provider base URLs.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EndpointConfig {
    pub api_base: Option<String>,
    pub history_base: Option<String>,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// default_city = "Amman"
/// fetch_timeout_secs = 15
///
/// [endpoints]
/// api_base = "https://api.openweathermap.org"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub api_key: Option<String>,
    pub default_city: Option<String>,
    pub fetch_timeout_secs: Option<u64>,
    pub hourly_count: Option<usize>,
    pub daily_anchor: Option<String>,
    #[serde(default)]
    pub endpoints: EndpointConfig,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "skycast", "skycast")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    /// API key from `SKYCAST_API_KEY`, falling back to the file.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_with_env(std::env::var(API_KEY_ENV).ok())
    }

    fn api_key_with_env(&self, env_value: Option<String>) -> Option<String> {
        env_value
            .or_else(|| self.api_key.clone())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }

    pub fn default_city(&self) -> &str {
        self.default_city
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CITY)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(
            self.fetch_timeout_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
        )
    }

    pub fn hourly_count(&self) -> usize {
        self.hourly_count.unwrap_or(DEFAULT_HOURLY_COUNT)
    }

    pub fn daily_anchor(&self) -> Result<NaiveTime, WeatherError> {
        let raw = self.daily_anchor.as_deref().unwrap_or(DEFAULT_DAILY_ANCHOR);
        NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S").map_err(|e| {
            WeatherError::InvalidInput(format!("daily_anchor '{raw}' is not HH:MM:SS: {e}"))
        })
    }

    pub fn endpoints(&self) -> Endpoints {
        let defaults = Endpoints::default();
        Endpoints {
            api_base: self.endpoints.api_base.clone().unwrap_or(defaults.api_base),
            history_base: self
                .endpoints
                .history_base
                .clone()
                .unwrap_or(defaults.history_base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::DEFAULT_API_BASE;

    #[test]
    fn defaults_apply_to_empty_config() {
        let cfg = Config::default();

        assert_eq!(cfg.default_city(), "Amman");
        assert_eq!(cfg.fetch_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.hourly_count(), 12);
        assert_eq!(
            cfg.daily_anchor().unwrap(),
            NaiveTime::from_hms_opt(12, 0, 0).unwrap()
        );
        assert_eq!(cfg.endpoints().api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn env_key_wins_over_file_key() {
        let mut cfg = Config::default();
        cfg.set_api_key("FILE_KEY".into());

        assert_eq!(
            cfg.api_key_with_env(Some("ENV_KEY".into())).as_deref(),
            Some("ENV_KEY")
        );
        assert_eq!(cfg.api_key_with_env(None).as_deref(), Some("FILE_KEY"));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let mut cfg = Config::default();
        cfg.set_api_key("   ".into());

        assert_eq!(cfg.api_key_with_env(None), None);
    }

    #[test]
    fn malformed_anchor_is_invalid_input() {
        let cfg = Config {
            daily_anchor: Some("noon".into()),
            ..Config::default()
        };

        assert!(cfg.daily_anchor().unwrap_err().is_input_error());
    }

    #[test]
    fn zero_timeout_falls_back_to_default() {
        let cfg = Config {
            fetch_timeout_secs: Some(0),
            ..Config::default()
        };

        assert_eq!(cfg.fetch_timeout(), Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let cfg = Config {
            api_key: Some("KEY".into()),
            default_city: Some("Irbid".into()),
            endpoints: EndpointConfig {
                api_base: Some("http://localhost:8080".into()),
                history_base: None,
            },
            ..Config::default()
        };
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.endpoints().api_base, "http://localhost:8080");
    }

    #[test]
    fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, Config::default());
    }
}
