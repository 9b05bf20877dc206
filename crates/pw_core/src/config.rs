use std::fs;
use std::path::Path;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// Persisted watch settings: what to search for, when to notify, and who
/// may be notified. Loaded per invocation and passed into the pipeline
/// explicitly; nothing reads it as ambient state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    pub topics: Vec<String>,
    /// "HH:MM", 24h clock.
    pub notification_time: String,
    /// IANA timezone name for the schedule, e.g. "UTC" or "US/Eastern".
    pub timezone: String,
    pub authorized_users: Vec<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    10
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            topics: vec!["cs.CV".to_string(), "cs.AI".to_string()],
            notification_time: "09:00".to_string(),
            timezone: "UTC".to_string(),
            authorized_users: Vec::new(),
            max_results: default_max_results(),
        }
    }
}

impl WatchConfig {
    /// Load from `path`, writing a default file first when none exists.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            info!("📝 Wrote default config to {}", path.display());
            return Ok(config);
        }
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        parse_notification_time(&self.notification_time)?;
        if self.max_results == 0 {
            return Err(Error::Config("max_results must be >= 1".to_string()));
        }
        Ok(())
    }

    pub fn set_notification_time(&mut self, time: &str) -> Result<()> {
        parse_notification_time(time)?;
        self.notification_time = time.to_string();
        Ok(())
    }
}

pub fn parse_notification_time(time: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(time, "%H:%M").map_err(|_| {
        Error::Config(format!(
            "invalid notification time '{}', expected HH:MM",
            time
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = WatchConfig::load(&path).unwrap();
        assert_eq!(config, WatchConfig::default());
        assert!(path.exists());

        // A second load reads back what was written.
        let reloaded = WatchConfig::load(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_load_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = WatchConfig::default();
        config.topics = vec!["q-bio.NC".to_string()];
        config.authorized_users = vec!["123456".to_string()];
        config.save(&path).unwrap();

        let loaded = WatchConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_notification_time_validation() {
        let mut config = WatchConfig::default();
        assert!(config.set_notification_time("15:30").is_ok());
        assert_eq!(config.notification_time, "15:30");
        assert!(config.set_notification_time("25:00").is_err());
        assert!(config.set_notification_time("nine").is_err());
        // Rejected values leave the config untouched.
        assert_eq!(config.notification_time, "15:30");
    }
}
