//! Rolling file persister
//!
//! Appends one record per message to a file and rolls it by size, by age,
//! or by whichever comes first. Rolled files are kept as numbered backups
//! (`app.log.1` is the newest) and optionally gzip-compressed.
//!
//! Rolling happens only inside `persist_messages`, i.e. on the buffer
//! worker thread, so no other writer can observe a half-rolled file.

use crate::core::config::LoggingConfig;
use crate::core::error::{LoggerError, Result};
use crate::core::last_chance;
use crate::core::log_level::LogLevel;
use crate::core::log_message::LogMessage;
use crate::core::persister::{render_each, Persister};
use crate::core::process_context::ProcessContext;
use crate::core::record_format::RecordFormat;
use crate::core::timestamp::TimestampFormat;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Consecutive failures to delete the oldest backup before rolling gives up
const MAX_DELETION_FAILURES: usize = 5;

/// When the active file is rolled
///
/// # Examples
///
/// ```
/// use rust_paged_logger::persisters::RollStrategy;
/// use std::time::Duration;
///
/// let by_size = RollStrategy::Size { max_bytes: 100 * 1024 * 1024 };
/// let hourly = RollStrategy::Time { interval: Duration::from_secs(3600) };
/// let either = RollStrategy::Hybrid {
///     max_bytes: 50 * 1024 * 1024,
///     interval: Duration::from_secs(24 * 3600),
/// };
/// assert_ne!(by_size, hourly);
/// assert_eq!(either.max_bytes(), Some(50 * 1024 * 1024));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RollStrategy {
    Size { max_bytes: u64 },
    Time { interval: Duration },
    Hybrid { max_bytes: u64, interval: Duration },
    Never,
}

impl Default for RollStrategy {
    fn default() -> Self {
        RollStrategy::Size {
            max_bytes: 10 * 1024 * 1024, // 10 MB
        }
    }
}

impl RollStrategy {
    /// Strategy implied by optional size and interval limits
    pub fn from_limits(max_bytes: Option<u64>, interval: Option<Duration>) -> Self {
        match (max_bytes, interval) {
            (Some(max_bytes), Some(interval)) => RollStrategy::Hybrid { max_bytes, interval },
            (Some(max_bytes), None) => RollStrategy::Size { max_bytes },
            (None, Some(interval)) => RollStrategy::Time { interval },
            (None, None) => RollStrategy::Never,
        }
    }

    pub fn max_bytes(&self) -> Option<u64> {
        match self {
            RollStrategy::Size { max_bytes } | RollStrategy::Hybrid { max_bytes, .. } => {
                Some(*max_bytes)
            }
            _ => None,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        match self {
            RollStrategy::Time { interval } | RollStrategy::Hybrid { interval, .. } => {
                Some(*interval)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RollPolicy {
    pub strategy: RollStrategy,
    /// Rolled files kept; `0` discards the old file on every roll
    pub max_backups: usize,
    pub compress: bool,
}

impl Default for RollPolicy {
    fn default() -> Self {
        Self {
            strategy: RollStrategy::default(),
            max_backups: 5,
            compress: false,
        }
    }
}

impl RollPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_strategy(mut self, strategy: RollStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size(mut self, max_bytes: u64) -> Self {
        self.strategy = RollStrategy::Size { max_bytes };
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = count;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }
}

pub struct RollingFilePersister {
    path: PathBuf,
    policy: RollPolicy,
    format: RecordFormat,
    timestamp_format: TimestampFormat,
    writer: Option<BufWriter<File>>,
    current_size: u64,
    last_roll: SystemTime,
    deletion_failures: usize,
}

impl RollingFilePersister {
    /// Persister for `path` with the default policy. Nothing is opened
    /// until [`Persister::initialize`].
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_policy(path, RollPolicy::default())
    }

    pub fn with_policy(path: impl AsRef<Path>, policy: RollPolicy) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            policy,
            format: RecordFormat::default(),
            timestamp_format: TimestampFormat::default(),
            writer: None,
            current_size: 0,
            last_roll: SystemTime::now(),
            deletion_failures: 0,
        }
    }

    /// Persister described by the `log_file_path`, roll and record settings;
    /// the path defaults to `logs/<application key>.log`
    pub fn from_config(config: &LoggingConfig, process: &ProcessContext) -> Self {
        let path = config
            .log_file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("logs").join(format!("{}.log", process.application_key)));
        let policy = RollPolicy {
            strategy: RollStrategy::from_limits(config.roll_size_bytes, config.roll_interval),
            max_backups: config.max_backups,
            compress: config.compress_backups,
        };
        Self::with_policy(path, policy).with_format(config.record_format)
    }

    #[must_use]
    pub fn with_format(mut self, format: RecordFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> &RollPolicy {
        &self.policy
    }

    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    pub fn last_roll(&self) -> SystemTime {
        self.last_roll
    }

    /// Path of backup number `index` (`app.log.3`)
    pub fn backup_path(&self, index: usize) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("app.log");
        self.path.with_file_name(format!("{}.{}", file_name, index))
    }

    fn open(&mut self) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                LoggerError::io_operation(
                    "open log file",
                    format!("Failed to open '{}'", self.path.display()),
                    e,
                )
            })?;
        let metadata = file.metadata().map_err(|e| {
            LoggerError::io_operation(
                "open log file",
                format!("Cannot read metadata of '{}'", self.path.display()),
                e,
            )
        })?;

        self.current_size = metadata.len();
        self.last_roll = metadata.modified().unwrap_or_else(|_| SystemTime::now());
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    fn should_roll(&self) -> bool {
        if self.current_size == 0 {
            return false;
        }
        let size_exceeded = |max: u64| self.current_size >= max;
        let age_exceeded = |interval: Duration| {
            SystemTime::now()
                .duration_since(self.last_roll)
                .unwrap_or(Duration::ZERO)
                >= interval
        };

        match &self.policy.strategy {
            RollStrategy::Never => false,
            RollStrategy::Size { max_bytes } => size_exceeded(*max_bytes),
            RollStrategy::Time { interval } => age_exceeded(*interval),
            RollStrategy::Hybrid { max_bytes, interval } => {
                size_exceeded(*max_bytes) || age_exceeded(*interval)
            }
        }
    }

    /// Flush, close, shift backups, move the active file to `.1`, reopen
    fn roll(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.path.display().to_string(),
                    format!("Failed to flush before rolling: {}", e),
                )
            })?;
        }

        if self.policy.max_backups == 0 {
            fs::remove_file(&self.path).map_err(|e| {
                LoggerError::file_rotation(
                    self.path.display().to_string(),
                    format!("Failed to discard rolled file: {}", e),
                )
            })?;
        } else {
            self.remove_oldest_backup()?;
            self.shift_backups()?;

            let first = self.backup_path(1);
            fs::rename(&self.path, &first).map_err(|e| {
                LoggerError::file_rotation(
                    self.path.display().to_string(),
                    format!("Failed to move active file aside: {}", e),
                )
            })?;
            if self.policy.compress {
                compress_file(&first)?;
            }
        }

        self.open()?;
        self.current_size = 0;
        self.last_roll = SystemTime::now();
        Ok(())
    }

    fn remove_oldest_backup(&mut self) -> Result<()> {
        let oldest = self.backup_path(self.policy.max_backups);
        let mut failed = false;

        for candidate in [gz_path(&oldest), oldest] {
            if candidate.exists() {
                if let Err(e) = fs::remove_file(&candidate) {
                    failed = true;
                    last_chance::log(
                        LogLevel::Warning,
                        &format!(
                            "Failed to remove oldest backup {}: {} (failure #{}/{})",
                            candidate.display(),
                            e,
                            self.deletion_failures + 1,
                            MAX_DELETION_FAILURES
                        ),
                    );
                }
            }
        }

        if !failed {
            self.deletion_failures = 0;
            return Ok(());
        }
        self.deletion_failures += 1;
        if self.deletion_failures >= MAX_DELETION_FAILURES {
            return Err(LoggerError::file_rotation(
                self.path.display().to_string(),
                format!(
                    "Roll aborted: failed to delete old backups {} consecutive times",
                    self.deletion_failures
                ),
            ));
        }
        Ok(())
    }

    fn shift_backups(&self) -> Result<()> {
        for index in (1..self.policy.max_backups).rev() {
            let from = self.backup_path(index);
            let to = self.backup_path(index + 1);

            for (old, new) in [(gz_path(&from), gz_path(&to)), (from, to)] {
                if !old.exists() {
                    continue;
                }
                if fs::rename(&old, &new).is_err() {
                    // Some platforms refuse to rename over an existing file.
                    let _ = fs::remove_file(&new);
                    fs::rename(&old, &new).map_err(|e| {
                        LoggerError::file_rotation(
                            old.display().to_string(),
                            format!("Failed to shift backup: {}", e),
                        )
                    })?;
                }
            }
        }
        Ok(())
    }

    fn write_record(&mut self, record: &str) -> Result<()> {
        if self.should_roll() {
            if let Err(e) = self.roll() {
                last_chance::log_error(
                    LogLevel::Warning,
                    "Log roll failed; continuing with the current file",
                    &e,
                );
                if self.writer.is_none() {
                    self.open()?;
                }
                // Let the file grow past its limit instead of retrying every record.
                self.current_size = 0;
            }
        }

        let writer = self.writer.as_mut().ok_or_else(|| {
            LoggerError::persister("rolling_file", "persister is not initialized")
        })?;
        writer.write_all(record.as_bytes()).map_err(|e| {
            LoggerError::io_operation(
                "write log record",
                format!("Failed to write to '{}'", self.path.display()),
                e,
            )
        })?;
        self.current_size += record.len() as u64;
        Ok(())
    }
}

impl Persister for RollingFilePersister {
    fn name(&self) -> &str {
        "rolling_file"
    }

    fn initialize(&mut self) -> Result<()> {
        if self.writer.is_some() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    LoggerError::io_operation(
                        "create log directory",
                        format!("Failed to create directory '{}'", parent.display()),
                        e,
                    )
                })?;
            }
        }
        self.open()
    }

    fn persist_messages(&mut self, page: &[Arc<LogMessage>]) -> Result<()> {
        let format = self.format;
        let timestamp_format = self.timestamp_format.clone();
        let records = render_each(self.name(), page, |m| format.render(m, &timestamp_format));

        for record in &records {
            self.write_record(record)?;
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for RollingFilePersister {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}

/// Gzip `path` to `path.gz`, removing the original only once the archive
/// is complete
fn compress_file(path: &Path) -> Result<()> {
    let gz = gz_path(path);
    let mut tmp_name = gz.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let result = (|| -> std::io::Result<()> {
        let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
        let output = BufWriter::with_capacity(64 * 1024, File::create(&tmp)?);
        let mut encoder = flate2::write::GzEncoder::new(output, flate2::Compression::default());

        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            let read = reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            encoder.write_all(&buffer[..read])?;
        }
        encoder.finish()?.flush()?;
        fs::rename(&tmp, &gz)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress '{}'", path.display()),
            e,
        ));
    }

    if let Err(e) = fs::remove_file(path) {
        last_chance::log(
            LogLevel::Warning,
            &format!(
                "Compressed {} but could not remove the original: {}",
                path.display(),
                e
            ),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::thread;
    use tempfile::tempdir;

    fn page(count: usize, text: &str) -> Vec<Arc<LogMessage>> {
        (0..count)
            .map(|i| {
                Arc::new(
                    LogMessage::new(LogLevel::Information, format!("{} {}", text, i))
                        .with_number(i as i32),
                )
            })
            .collect()
    }

    fn backups(dir: &Path, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(prefix) && n != prefix)
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_nothing_opened_before_initialize() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("app.log");
        let mut persister = RollingFilePersister::new(&path);

        assert!(!path.exists());
        persister.close().unwrap();

        persister.initialize().unwrap();
        persister.initialize().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_persist_before_initialize_fails() {
        let dir = tempdir().unwrap();
        let mut persister = RollingFilePersister::new(dir.path().join("app.log"));
        assert!(persister.persist_messages(&page(1, "early")).is_err());
    }

    #[test]
    fn test_text_records_are_appended() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut persister = RollingFilePersister::new(&path);
        persister.initialize().unwrap();

        persister.persist_messages(&page(3, "hello")).unwrap();
        persister.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("  hello 0\n"));
        assert!(content.contains("  hello 2\n"));
        assert_eq!(content.matches("Log Level: INFORMATION").count(), 3);
    }

    #[test]
    fn test_json_lines_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.jsonl");
        let mut persister = RollingFilePersister::new(&path).with_format(RecordFormat::JsonLines);
        persister.initialize().unwrap();

        let written = page(2, "json");
        persister.persist_messages(&written).unwrap();
        persister.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let parsed: Vec<LogMessage> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1], *written[1]);
    }

    #[test]
    fn test_size_roll_caps_backups() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roll.log");
        let policy = RollPolicy::new().with_max_size(200).with_max_backups(2);
        let mut persister = RollingFilePersister::with_policy(&path, policy);
        persister.initialize().unwrap();

        for _ in 0..10 {
            persister.persist_messages(&page(2, "roll")).unwrap();
        }
        persister.close().unwrap();

        assert_eq!(backups(dir.path(), "roll.log"), vec!["roll.log.1", "roll.log.2"]);
    }

    #[test]
    fn test_time_roll() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("timed.log");
        let policy = RollPolicy::new().with_strategy(RollStrategy::Time {
            interval: Duration::from_millis(50),
        });
        let mut persister = RollingFilePersister::with_policy(&path, policy);
        persister.initialize().unwrap();

        persister.persist_messages(&page(1, "before")).unwrap();
        thread::sleep(Duration::from_millis(80));
        persister.persist_messages(&page(1, "after")).unwrap();
        persister.close().unwrap();

        let rolled = fs::read_to_string(persister.backup_path(1)).unwrap();
        assert!(rolled.contains("before 0"));
        let active = fs::read_to_string(&path).unwrap();
        assert!(active.contains("after 0"));
        assert!(!active.contains("before 0"));
    }

    #[test]
    fn test_never_strategy_does_not_roll() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("never.log");
        let policy = RollPolicy::new().with_strategy(RollStrategy::Never);
        let mut persister = RollingFilePersister::with_policy(&path, policy);
        persister.initialize().unwrap();

        for _ in 0..20 {
            persister.persist_messages(&page(5, "never")).unwrap();
        }
        persister.close().unwrap();
        assert!(backups(dir.path(), "never.log").is_empty());
    }

    #[test]
    fn test_compressed_backups() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gz.log");
        let policy = RollPolicy::new()
            .with_max_size(100)
            .with_max_backups(3)
            .with_compression(true);
        let mut persister = RollingFilePersister::with_policy(&path, policy);
        persister.initialize().unwrap();

        persister.persist_messages(&page(1, "first")).unwrap();
        persister.persist_messages(&page(1, "second")).unwrap();
        persister.close().unwrap();

        let archive = dir.path().join("gz.log.1.gz");
        assert!(archive.exists());
        assert!(!dir.path().join("gz.log.1").exists());

        let mut text = String::new();
        GzDecoder::new(File::open(archive).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert!(text.contains("first 0"));
    }

    #[test]
    fn test_strategy_from_limits() {
        let hour = Duration::from_secs(3600);
        assert_eq!(RollStrategy::from_limits(None, None), RollStrategy::Never);
        assert_eq!(
            RollStrategy::from_limits(Some(10), Some(hour)),
            RollStrategy::Hybrid { max_bytes: 10, interval: hour }
        );
        assert_eq!(RollStrategy::from_limits(None, Some(hour)).interval(), Some(hour));
    }

    #[test]
    fn test_from_config_default_path() {
        let config = LoggingConfig::default();
        let process = ProcessContext::fixed("billing", "test", "host");
        let persister = RollingFilePersister::from_config(&config, &process);
        assert_eq!(persister.path(), Path::new("logs/billing.log"));
        assert_eq!(persister.policy().max_backups, 5);
    }
}
