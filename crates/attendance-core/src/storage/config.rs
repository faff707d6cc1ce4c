//! TOML-based application configuration.
//!
//! Stores:
//! - Session cap, coarse persistence interval and tick interval
//! - Notification preferences and texts
//!
//! Configuration is stored at `~/.config/attendance/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, Result};
use crate::notify::NotificationTemplates;
use crate::session::{DEFAULT_CAP_SECS, DEFAULT_PERSIST_INTERVAL_SECS, DEFAULT_TICK_INTERVAL_MS};
use crate::timer::TimerSettings;

/// Session timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cap_secs")]
    pub cap_secs: u64,
    #[serde(default = "default_persist_interval_secs")]
    pub persist_interval_secs: u64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cap_title")]
    pub cap_title: String,
    #[serde(default = "default_cap_body")]
    pub cap_body: String,
    #[serde(default = "default_clocked_out_title")]
    pub clocked_out_title: String,
    #[serde(default = "default_clocked_out_body")]
    pub clocked_out_body: String,
    /// Body of the clocked-out alert when the cap ended the session.
    #[serde(default = "default_cap_reached_body")]
    pub cap_reached_body: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/attendance/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

fn default_cap_secs() -> u64 {
    DEFAULT_CAP_SECS
}
fn default_persist_interval_secs() -> u64 {
    DEFAULT_PERSIST_INTERVAL_SECS
}
fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}
fn default_true() -> bool {
    true
}
fn default_cap_title() -> String {
    "Session limit reached".into()
}
fn default_cap_body() -> String {
    "You have been clocked in for 4 hours and will be clocked out.".into()
}
fn default_clocked_out_title() -> String {
    "Clocked out".into()
}
fn default_clocked_out_body() -> String {
    "Your attendance session has ended.".into()
}
fn default_cap_reached_body() -> String {
    "You were clocked out automatically after reaching the session limit.".into()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cap_secs: default_cap_secs(),
            persist_interval_secs: default_persist_interval_secs(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cap_title: default_cap_title(),
            cap_body: default_cap_body(),
            clocked_out_title: default_clocked_out_title(),
            clocked_out_body: default_clocked_out_body(),
            cap_reached_body: default_cap_reached_body(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::InvalidValue {
            key: key.to_string(),
            message: "unknown config key".into(),
        };
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let (parent_path, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        if leaf.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        if let Some(parent_path) = parent_path {
            for part in parent_path.split('.') {
                current = current.get_mut(part).ok_or_else(unknown)?;
            }
        }

        let obj = current.as_object_mut().ok_or_else(unknown)?;
        let existing = obj.get(leaf).ok_or_else(unknown)?;
        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|e| invalid(e.to_string()))?,
            ),
            serde_json::Value::Number(_) => serde_json::Value::Number(
                value
                    .parse::<u64>()
                    .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                    .into(),
            ),
            serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
            }
            _ => serde_json::Value::String(value.into()),
        };
        obj.insert(leaf.to_string(), new_value);
        Ok(())
    }

    /// Location of the config file.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults there if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or fails validation.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content)
                    .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(error = %e, "falling back to default configuration");
                Self::default()
            }
        }
    }

    /// Reject values the timer cannot run with.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("session.cap_secs", self.session.cap_secs),
            ("session.persist_interval_secs", self.session.persist_interval_secs),
            ("session.tick_interval_ms", self.session.tick_interval_ms),
        ];
        for (key, value) in checks {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: "must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving. Returns error if key is unknown
    /// or the result fails validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json)?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn settings(&self) -> TimerSettings {
        TimerSettings {
            cap_secs: self.session.cap_secs,
            persist_interval_secs: self.session.persist_interval_secs,
            tick_interval: Duration::from_millis(self.session.tick_interval_ms),
        }
    }

    pub fn templates(&self) -> NotificationTemplates {
        let n = &self.notifications;
        NotificationTemplates {
            cap_title: n.cap_title.clone(),
            cap_body: n.cap_body.clone(),
            clocked_out_title: n.clocked_out_title.clone(),
            clocked_out_body: n.clocked_out_body.clone(),
            cap_reached_body: n.cap_reached_body.clone(),
        }
    }
}
