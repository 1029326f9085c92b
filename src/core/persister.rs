//! Persister trait for message sinks

use super::error::{LoggerError, Result};
use super::last_chance;
use super::log_level::LogLevel;
use super::log_message::LogMessage;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Durable sink for pages of messages.
///
/// All methods run on the buffer worker thread, one call at a time, so
/// implementations need no internal locking.
pub trait Persister: Send {
    fn name(&self) -> &str;

    /// Acquire resources (open files, create directories).
    ///
    /// Called before the first page. A failure is retried on the next page.
    fn initialize(&mut self) -> Result<()>;

    /// Write one page in order. A message that cannot be rendered is
    /// skipped; only a failure of the backing store fails the page.
    fn persist_messages(&mut self, page: &[Arc<LogMessage>]) -> Result<()>;

    /// Flush and release resources. Must be safe without `initialize`.
    fn close(&mut self) -> Result<()>;
}

/// Render every message of a page, isolating failures.
///
/// A message whose rendering returns an error or panics is reported
/// through the last-chance logger and left out; the rest are returned in
/// page order.
pub fn render_each<F>(persister: &str, page: &[Arc<LogMessage>], mut render: F) -> Vec<String>
where
    F: FnMut(&LogMessage) -> Result<String>,
{
    let mut records = Vec::with_capacity(page.len());
    for (index, message) in page.iter().enumerate() {
        match catch_unwind(AssertUnwindSafe(|| render(message))) {
            Ok(Ok(record)) => records.push(record),
            Ok(Err(e)) => report_skipped(persister, index, message, &e),
            Err(payload) => {
                let err = LoggerError::panicked(format!("{} renderer", persister), &*payload);
                report_skipped(persister, index, message, &err);
            }
        }
    }
    records
}

fn report_skipped(persister: &str, index: usize, message: &LogMessage, error: &LoggerError) {
    last_chance::log_error(
        LogLevel::Error,
        &format!(
            "{}: skipped message #{} of page ({} {:04})",
            persister,
            index,
            message.level(),
            message.message_number
        ),
        error,
    );
}
