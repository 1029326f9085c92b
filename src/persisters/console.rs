//! Console persister
//!
//! Writes one compact line per message to stdout, or JSON lines when
//! configured. Levels are colored when the `console` feature is enabled.

use crate::core::error::Result;
use crate::core::log_message::LogMessage;
use crate::core::persister::{render_each, Persister};
use crate::core::record_format::{sanitize, RecordFormat};
use crate::core::timestamp::TimestampFormat;
use std::io::Write;
use std::sync::Arc;

#[cfg(feature = "console")]
use colored::Colorize;

pub struct ConsolePersister {
    use_colors: bool,
    format: RecordFormat,
}

impl ConsolePersister {
    pub fn new() -> Self {
        Self {
            use_colors: cfg!(feature = "console"),
            format: RecordFormat::Text,
        }
    }

    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// `Text` selects the compact line; `JsonLines` prints full records
    #[must_use]
    pub fn with_format(mut self, format: RecordFormat) -> Self {
        self.format = format;
        self
    }

    /// `HH:MM:SS.mmm LEVEL [logger] text (error)`
    pub fn format_line(&self, message: &LogMessage) -> String {
        let level = format!("{:11}", message.level().to_str());
        #[cfg(feature = "console")]
        let level = if self.use_colors {
            level.color(message.level().color_code()).to_string()
        } else {
            level
        };

        let mut line = format!(
            "{} {} [{}] {}",
            TimestampFormat::short(&message.timestamp),
            level,
            message.logger_name,
            sanitize(&message.message_text)
        );
        if let Some(error) = &message.error {
            line.push_str(" (");
            line.push_str(&sanitize(&error.expanded()));
            line.push(')');
        }
        line.push('\n');
        line
    }
}

impl Default for ConsolePersister {
    fn default() -> Self {
        Self::new()
    }
}

impl Persister for ConsolePersister {
    fn name(&self) -> &str {
        "console"
    }

    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn persist_messages(&mut self, page: &[Arc<LogMessage>]) -> Result<()> {
        let records = render_each(self.name(), page, |m| match self.format {
            RecordFormat::Text => Ok(self.format_line(m)),
            RecordFormat::JsonLines => self.format.render(m, &TimestampFormat::default()),
        });

        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for record in &records {
            out.write_all(record.as_bytes())?;
        }
        out.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        std::io::stdout().flush()?;
        Ok(())
    }
}
