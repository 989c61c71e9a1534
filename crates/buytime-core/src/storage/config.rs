//! TOML-based application configuration.
//!
//! Stores:
//! - Remote service settings (base URL, request timeout, provisioning poll)
//! - Reconciler timings (debounce window, error banner lifetime, cache TTL)
//! - Restriction defaults (spend unit, re-application failure policy)
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::restriction::ReapplyPolicy;

/// Remote service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Attempts made while waiting for a freshly signed-up account to exist.
    #[serde(default = "default_provisioning_attempts")]
    pub provisioning_attempts: u32,
    #[serde(default = "default_provisioning_delay_ms")]
    pub provisioning_delay_ms: u64,
}

/// Reconciler timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_error_display_secs")]
    pub error_display_secs: u64,
    #[serde(default = "default_preferences_ttl_hours")]
    pub preferences_ttl_hours: u64,
}

/// Restriction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestrictionConfig {
    #[serde(default = "default_spend_unit_minutes")]
    pub default_spend_unit_minutes: u32,
    #[serde(default)]
    pub reapply_policy: ReapplyPolicy,
    /// Activity name of the repeating daily blocker schedule.
    #[serde(default = "default_blocker_activity_id")]
    pub blocker_activity_id: String,
    /// Activity name used for earned-time monitoring windows.
    #[serde(default = "default_earned_activity_id")]
    pub earned_activity_id: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub restriction: RestrictionConfig,
}

// Default functions
fn default_base_url() -> String {
    "http://localhost:3000".into()
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_provisioning_attempts() -> u32 {
    5
}
fn default_provisioning_delay_ms() -> u64 {
    1000
}
fn default_debounce_ms() -> u64 {
    500
}
fn default_error_display_secs() -> u64 {
    3
}
fn default_preferences_ttl_hours() -> u64 {
    24
}
fn default_spend_unit_minutes() -> u32 {
    5
}
fn default_blocker_activity_id() -> String {
    "com.buytime.blockerActivity".into()
}
fn default_earned_activity_id() -> String {
    "com.buytime.earnedTime".into()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            provisioning_attempts: default_provisioning_attempts(),
            provisioning_delay_ms: default_provisioning_delay_ms(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            error_display_secs: default_error_display_secs(),
            preferences_ttl_hours: default_preferences_ttl_hours(),
        }
    }
}

impl Default for RestrictionConfig {
    fn default() -> Self {
        Self {
            default_spend_unit_minutes: default_spend_unit_minutes(),
            reapply_policy: ReapplyPolicy::default(),
            blocker_activity_id: default_blocker_activity_id(),
            earned_activity_id: default_earned_activity_id(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn error_display(&self) -> Duration {
        Duration::from_secs(self.error_display_secs)
    }

    pub fn preferences_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.preferences_ttl_hours as i64)
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
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        return Err(invalid("not a scalar key".into()));
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing and returning the defaults when no file
    /// exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.clone(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(&path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a value by dotted key path (e.g. `sync.debounce_ms`).
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match Self::get_json_value_by_path(&json, key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dotted key path and persist.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown keys, values that don't parse into the
    /// key's type, or if saving fails.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Set a value by dotted key path without touching disk.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_timings() {
        let cfg = Config::default();
        assert_eq!(cfg.sync.debounce(), Duration::from_millis(500));
        assert_eq!(cfg.sync.error_display(), Duration::from_secs(3));
        assert_eq!(cfg.sync.preferences_ttl(), chrono::Duration::hours(24));
        assert_eq!(cfg.restriction.default_spend_unit_minutes, 5);
        assert_eq!(cfg.restriction.reapply_policy, ReapplyPolicy::FailClosed);
    }

    #[test]
    fn get_by_dotted_path() {
        let cfg = Config::default();
        assert_eq!(cfg.get("sync.debounce_ms").as_deref(), Some("500"));
        assert_eq!(
            cfg.get("api.base_url").as_deref(),
            Some("http://localhost:3000")
        );
        assert_eq!(cfg.get("restriction.reapply_policy").as_deref(), Some("fail_closed"));
        assert!(cfg.get("nope").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn apply_typed_values() {
        let mut cfg = Config::default();
        cfg.apply("sync.debounce_ms", "250").unwrap();
        cfg.apply("restriction.reapply_policy", "fail_open").unwrap();
        assert_eq!(cfg.sync.debounce_ms, 250);
        assert_eq!(cfg.restriction.reapply_policy, ReapplyPolicy::FailOpen);
    }

    #[test]
    fn apply_rejects_bad_input() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.apply("sync.nope", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.apply("sync.debounce_ms", "soon"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.apply("restriction.reapply_policy", "sometimes"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.apply("sync", "1"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str("[api]\nbase_url = \"https://api.example.com\"\n").unwrap();
        assert_eq!(cfg.api.base_url, "https://api.example.com");
        assert_eq!(cfg.api.request_timeout_secs, 10);
        assert_eq!(cfg.sync.debounce_ms, 500);
    }
}
