//! Logging configuration
//!
//! Settings can be built in code, deserialized with serde, read from a
//! string-keyed map, or read from `PAGED_LOG_*` environment variables.

use super::error::{LoggerError, Result};
use super::last_chance;
use super::log_level::LogLevel;
use super::record_format::RecordFormat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub const KEY_APPLICATION_KEY: &str = "application_key";
pub const KEY_ACTIVE_ENVIRONMENT: &str = "active_environment";
pub const KEY_PERSISTER: &str = "persister";
pub const KEY_LOG_FILE_PATH: &str = "log_file_path";
pub const KEY_ROLL_SIZE_BYTES: &str = "roll_size_bytes";
pub const KEY_ROLL_INTERVAL_SECS: &str = "roll_interval_secs";
pub const KEY_MAX_BACKUPS: &str = "max_backups";
pub const KEY_COMPRESS_BACKUPS: &str = "compress_backups";
pub const KEY_RECORD_FORMAT: &str = "record_format";
pub const KEY_PAGE_SIZE: &str = "page_size";
pub const KEY_FLUSH_INTERVAL_MS: &str = "flush_interval_ms";
pub const KEY_QUEUE_CAPACITY: &str = "queue_capacity";
pub const KEY_MINIMUM_LEVEL: &str = "minimum_level";
pub const KEY_CAPTURE_STACK: &str = "capture_stack";
pub const KEY_LAST_CHANCE_PATH: &str = "last_chance_path";

/// Prefix of the environment variables read by [`LoggingConfig::from_env`]
pub const ENV_PREFIX: &str = "PAGED_LOG_";

/// Which persister a pipeline instantiates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersisterKind {
    #[default]
    RollingFile,
    Console,
    Memory,
}

impl std::str::FromStr for PersisterKind {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "rolling_file" | "file" => Ok(PersisterKind::RollingFile),
            "console" => Ok(PersisterKind::Console),
            "memory" => Ok(PersisterKind::Memory),
            other => Err(LoggerError::config(
                KEY_PERSISTER,
                format!("unknown persister '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Explicit application key; resolved from the executable when absent
    pub application_key: Option<String>,
    /// Deployment environment label; the host name when absent
    pub active_environment: Option<String>,
    pub persister: PersisterKind,
    /// Rolling file path; `logs/<application key>.log` when absent
    pub log_file_path: Option<PathBuf>,
    pub roll_size_bytes: Option<u64>,
    pub roll_interval: Option<Duration>,
    pub max_backups: usize,
    pub compress_backups: bool,
    pub record_format: RecordFormat,
    pub page_size: usize,
    pub flush_interval: Duration,
    /// Upper bound on pending messages; unbounded when absent
    pub queue_capacity: Option<usize>,
    pub minimum_level: LogLevel,
    pub capture_stack: bool,
    pub last_chance_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            application_key: None,
            active_environment: None,
            persister: PersisterKind::RollingFile,
            log_file_path: None,
            roll_size_bytes: Some(10 * 1024 * 1024), // 10 MB
            roll_interval: None,
            max_backups: 5,
            compress_backups: false,
            record_format: RecordFormat::Text,
            page_size: 100,
            flush_interval: Duration::from_millis(500),
            queue_capacity: None,
            minimum_level: LogLevel::Information,
            capture_stack: true,
            last_chance_path: None,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a string-keyed map, starting from defaults.
    ///
    /// Unknown keys are ignored; malformed values are an error.
    pub fn from_map(settings: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();
        for (key, value) in settings {
            config.apply(key, value)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Load settings from `PAGED_LOG_<KEY>` environment variables
    pub fn from_env() -> Result<Self> {
        let settings: HashMap<String, String> = std::env::vars()
            .filter_map(|(key, value)| {
                key.strip_prefix(ENV_PREFIX)
                    .map(|k| (k.to_lowercase(), value))
            })
            .collect();
        Self::from_map(&settings)
    }

    /// Parse settings from a JSON document
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Look up a setting that must be present.
    ///
    /// A missing or empty value is reported through the last-chance logger
    /// and returned as [`LoggerError::MissingSetting`].
    pub fn require<'a>(settings: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
        match settings.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
            Some(value) => Ok(value),
            None => {
                let err = LoggerError::missing_setting(key);
                last_chance::log(LogLevel::Error, &err.to_string());
                Err(err)
            }
        }
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            KEY_APPLICATION_KEY => self.application_key = non_empty(value),
            KEY_ACTIVE_ENVIRONMENT => self.active_environment = non_empty(value),
            KEY_PERSISTER => self.persister = value.parse()?,
            KEY_LOG_FILE_PATH => self.log_file_path = non_empty(value).map(PathBuf::from),
            KEY_ROLL_SIZE_BYTES => self.roll_size_bytes = parse_optional(key, value)?,
            KEY_ROLL_INTERVAL_SECS => {
                self.roll_interval = parse_optional::<u64>(key, value)?.map(Duration::from_secs)
            }
            KEY_MAX_BACKUPS => self.max_backups = parse(key, value)?,
            KEY_COMPRESS_BACKUPS => self.compress_backups = parse(key, value)?,
            KEY_RECORD_FORMAT => {
                self.record_format = value
                    .parse::<RecordFormat>()
                    .map_err(|e| LoggerError::config(key, e))?
            }
            KEY_PAGE_SIZE => self.page_size = parse(key, value)?,
            KEY_FLUSH_INTERVAL_MS => {
                self.flush_interval = Duration::from_millis(parse(key, value)?)
            }
            KEY_QUEUE_CAPACITY => self.queue_capacity = parse_optional(key, value)?,
            KEY_MINIMUM_LEVEL => {
                self.minimum_level = value
                    .parse::<LogLevel>()
                    .map_err(|e| LoggerError::config(key, e))?
            }
            KEY_CAPTURE_STACK => self.capture_stack = parse(key, value)?,
            KEY_LAST_CHANCE_PATH => self.last_chance_path = non_empty(value).map(PathBuf::from),
            _ => {}
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(LoggerError::config(KEY_PAGE_SIZE, "page size must be at least 1"));
        }
        if self.flush_interval.is_zero() {
            return Err(LoggerError::config(
                KEY_FLUSH_INTERVAL_MS,
                "flush interval must be greater than zero",
            ));
        }
        if self.queue_capacity == Some(0) {
            return Err(LoggerError::config(
                KEY_QUEUE_CAPACITY,
                "queue capacity must be at least 1",
            ));
        }
        Ok(())
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_application_key(mut self, key: impl Into<String>) -> Self {
        self.application_key = Some(key.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.active_environment = Some(environment.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_persister(mut self, kind: PersisterKind) -> Self {
        self.persister = kind;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file_path = Some(path.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_minimum_level(mut self, level: LogLevel) -> Self {
        self.minimum_level = level;
        self
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| LoggerError::config(key, format!("'{}': {}", value, e)))
}

fn parse_optional<T: std::str::FromStr>(key: &str, value: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match value.to_lowercase().as_str() {
        "" | "none" | "off" => Ok(None),
        _ => parse(key, value).map(Some),
    }
}
