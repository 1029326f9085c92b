//! Last-chance logger
//!
//! A synchronous, process-wide fallback channel used when the asynchronous
//! pipeline cannot be trusted: persister failures, worker panics, rejected
//! submissions, and configuration errors. It never goes through the
//! buffer, never returns an error, and never panics. Output goes to stderr
//! and, when configured, is appended to a separate file.

use super::log_level::LogLevel;
use chrono::Utc;
use parking_lot::{const_mutex, Mutex};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

static FILE_SINK: Mutex<Option<File>> = const_mutex(None);
static STDERR_ENABLED: AtomicBool = AtomicBool::new(true);
static REPORT_COUNT: AtomicU64 = AtomicU64::new(0);

/// Write one diagnostic line. Never fails.
pub fn log(level: LogLevel, message: &str) {
    REPORT_COUNT.fetch_add(1, Ordering::Relaxed);
    let line = format!(
        "{} [LOGGER {}] {}\n",
        Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
        level,
        message.replace('\n', "\\n")
    );

    if STDERR_ENABLED.load(Ordering::Relaxed) {
        let _ = std::io::stderr().write_all(line.as_bytes());
    }

    let mut sink = FILE_SINK.lock();
    if let Some(file) = sink.as_mut() {
        if file.write_all(line.as_bytes()).is_err() {
            // A broken file sink is dropped; stderr keeps working.
            *sink = None;
        }
    }
}

/// Report an error and its `source()` chain
pub fn log_error(level: LogLevel, context: &str, error: &dyn std::error::Error) {
    let mut text = format!("{}: {}", context, error);
    let mut source = error.source();
    while let Some(inner) = source {
        text.push_str(" <- ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    log(level, &text);
}

/// Report only the first occurrence and every 1000th after that
pub fn log_rate_limited(level: LogLevel, occurrence: u64, message: &str) {
    if occurrence == 0 || (occurrence + 1) % 1000 == 0 {
        log(level, &format!("{} (occurrence #{})", message, occurrence + 1));
    }
}

/// Additionally append last-chance output to `path`.
///
/// Returns `false` if the file could not be opened; stderr output is
/// unaffected either way.
pub fn set_file(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && std::fs::create_dir_all(parent).is_err() {
            return false;
        }
    }
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => {
            *FILE_SINK.lock() = Some(file);
            true
        }
        Err(_) => false,
    }
}

pub fn clear_file() {
    *FILE_SINK.lock() = None;
}

/// Silence or restore the stderr copy (file output is unaffected)
pub fn set_stderr_enabled(enabled: bool) {
    STDERR_ENABLED.store(enabled, Ordering::Relaxed);
}

/// Number of diagnostics written since process start
pub fn report_count() -> u64 {
    REPORT_COUNT.load(Ordering::Relaxed)
}
