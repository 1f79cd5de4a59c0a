//! YAML configuration.
//!
//! Values are looked up by dotted keys (`task.default.priority`) that walk
//! nested mappings. Typed accessors never fail: an absent key yields the
//! default, an unusable one is logged and yields the default too.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::fields::{Priority, RecurrenceType};
use crate::lifecycle::Settings;

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// `$HOME/.local/share/rdo`, or `./.rdo` without a home directory.
pub fn data_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".local").join("share").join("rdo"),
        None => PathBuf::from(".rdo"),
    }
}

pub fn default_config_path() -> PathBuf {
    data_dir().join("config.yaml")
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    data: Value,
}

impl Config {
    /// Read configuration from `path`. A missing file is an empty
    /// configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no configuration file, using defaults");
                return Ok(Config::default());
            }
            Err(source) => {
                return Err(ConfigError::Io { path: path.display().to_string(), source })
            }
        };
        Self::parse(&text).map_err(|source| ConfigError::Yaml {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        let data: Value = serde_yaml::from_str(text)?;
        Ok(Self::from_value(data))
    }

    pub fn from_value(data: Value) -> Self {
        Config { data }
    }

    /// Value at a dotted key, if every segment resolves.
    pub fn get(&self, key: &str) -> Option<&Value> {
        key.split('.').try_fold(&self.data, |node, segment| match node {
            Value::Mapping(map) => map.get(segment),
            _ => None,
        })
    }

    /// Scalar at `key` rendered as a string.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn default_priority(&self) -> Option<Priority> {
        self.parsed("task.default.priority")
    }

    pub fn default_recurrence_type(&self) -> RecurrenceType {
        self.parsed("task.default.recurrence_type").unwrap_or(RecurrenceType::Repeating)
    }

    pub fn date_format(&self) -> String {
        self.get_str("report.date_format").unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string())
    }

    pub fn storage_path(&self) -> PathBuf {
        self.get_str("storage.path")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir().join("tasks.json"))
    }

    pub fn log_level(&self) -> String {
        self.get_str("log.level").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }

    /// Lifecycle defaults drawn from this configuration.
    pub fn settings(&self) -> Settings {
        Settings {
            default_priority: self.default_priority(),
            default_recurrence_type: self.default_recurrence_type(),
        }
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.get_str(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(key, value = %raw, "ignoring invalid configuration value");
                None
            }
        }
    }
}
