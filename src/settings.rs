use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::warn;

use crate::Result;

pub const OAUTH_TOKEN_KEY: &str = "oauth_token";
pub const POLL_INTERVAL_KEY: &str = "poll_interval";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const MIN_POLL_INTERVAL_SECS: u64 = 15;

/// Poll period for a configured number of seconds. Zero means "use the
/// default"; anything below the minimum is raised to it.
pub fn poll_interval(secs: u64) -> Duration {
    let secs = match secs {
        0 => DEFAULT_POLL_INTERVAL_SECS,
        s => s.max(MIN_POLL_INTERVAL_SECS),
    };
    Duration::from_secs(secs)
}

/// Key-value persistence for settings and the OAuth2 token blob.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn unset(&self, key: &str) -> Result<()>;
}

/// The configured poll period, falling back to the default when unset or unparseable.
pub fn read_poll_interval(settings: &dyn SettingsStore) -> Duration {
    let secs = settings
        .get(POLL_INTERVAL_KEY)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);
    poll_interval(secs)
}

#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn unset(&self, key: &str) -> Result<()> {
        if let Ok(mut values) = self.values.lock() {
            values.remove(key);
        }
        Ok(())
    }
}

/// Settings kept as a single JSON object on disk. Every write rewrites the file.
pub struct JsonFileSettings {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Map<String, Value> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Map::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(Value::Object(map)) => map,
            _ => {
                warn!(path = %self.path.display(), "settings file is not a JSON object, ignoring");
                Map::new()
            }
        }
    }

    fn save(&self, map: Map<String, Value>) -> Result<()> {
        let body = serde_json::to_string_pretty(&Value::Object(map))?;
        fs::write(&self.path, body)?;
        Ok(())
    }
}

impl SettingsStore for JsonFileSettings {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock().ok()?;
        match self.load().remove(key)? {
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().ok();
        let mut map = self.load();
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.save(map)
    }

    fn unset(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().ok();
        let mut map = self.load();
        if map.remove(key).is_some() {
            self.save(map)?;
        }
        Ok(())
    }
}
