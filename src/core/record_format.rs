//! Record rendering for persisters
//!
//! - Text: labeled multi-line block, one per message (default)
//! - JsonLines: one JSON object per line, lossless

use super::error::{LoggerError, Result};
use super::log_message::LogMessage;
use super::timestamp::TimestampFormat;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    /// Human-readable block:
    ///
    /// ```text
    /// 2025-01-08T10:30:45.123Z
    ///   Payment declined
    ///     Log Level: WARNING
    ///      Priority: High
    /// ...
    /// ```
    #[default]
    Text,

    /// `{"timestamp":"2025-01-08T10:30:45.123Z","level":"Warning",...}`
    JsonLines,
}

impl FromStr for RecordFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "txt" => Ok(RecordFormat::Text),
            "json" | "jsonl" | "json_lines" | "jsonlines" => Ok(RecordFormat::JsonLines),
            other => Err(format!("unknown record format '{}'", other)),
        }
    }
}

impl RecordFormat {
    /// Render one record, including its trailing newline
    pub fn render(&self, message: &LogMessage, timestamp_format: &TimestampFormat) -> Result<String> {
        match self {
            RecordFormat::Text => render_text(message, timestamp_format),
            RecordFormat::JsonLines => {
                let mut line = serde_json::to_string(message)?;
                line.push('\n');
                Ok(line)
            }
        }
    }
}

/// Escape control characters so one record can never look like two
pub fn sanitize(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

fn render_text(m: &LogMessage, timestamp_format: &TimestampFormat) -> Result<String> {
    let mut out = String::with_capacity(512);
    write_text(&mut out, m, timestamp_format)
        .map_err(|e| LoggerError::formatter("text", e.to_string()))?;
    Ok(out)
}

fn write_text(
    out: &mut String,
    m: &LogMessage,
    timestamp_format: &TimestampFormat,
) -> std::fmt::Result {
    writeln!(out, "{}", timestamp_format.format(&m.timestamp))?;
    writeln!(out, "  {}", sanitize(&m.message_text))?;
    writeln!(out, "    Log Level: {}", m.level())?;
    writeln!(out, "     Priority: {}", m.priority())?;
    writeln!(out, "  Application: {}", sanitize(&m.application_key))?;
    writeln!(out, "      Sub Key: {}", sanitize(m.sub_key.as_deref().unwrap_or("")))?;
    writeln!(out, "  Environment: {}", sanitize(&m.environment))?;
    writeln!(out, "      Machine: {}", sanitize(&m.host_name))?;
    writeln!(out, "  Activity Id: {}", m.activity_id)?;
    writeln!(out, "  Logger Name: {}", sanitize(&m.logger_name))?;
    writeln!(out, "Message Class: {}", m.message_class)?;
    writeln!(out, " Message Type: {}", sanitize(&m.message_type))?;
    match &m.caller {
        Some(caller) => writeln!(out, "       Caller: {}", caller)?,
        None => writeln!(out, "       Caller: (unknown)")?,
    }

    if let Some(ctx) = &m.runtime_context {
        let machine = &ctx.machine;
        writeln!(out, "    Machine Context:")?;
        writeln!(out, "      Identity:      {}", sanitize(&machine.identity))?;
        writeln!(out, "      Process:       {} ({})", machine.process_id, sanitize(&machine.thread))?;
        match &machine.stack {
            Some(stack) => writeln!(out, "      Stack:         {}", sanitize(stack))?,
            None => writeln!(out, "      Stack:         (see exception)")?,
        }
    }

    writeln!(out, "    Title:           {}", sanitize(&m.title()))?;
    match &m.error {
        Some(error) => writeln!(out, "    Exception:       {}", sanitize(&error.expanded()))?,
        None => writeln!(out, "    Exception:       (none)")?,
    }

    if let Some(request) = m.runtime_context.as_ref().and_then(|c| c.request.as_deref()) {
        writeln!(out, "    HTTP Request:    {}", sanitize(request))?;
    }

    if let Some(trace) = &m.trace {
        writeln!(
            out,
            "    Trace:           {} {} id={} parent={} elapsed={}ms",
            trace.direction,
            sanitize(&trace.category),
            trace.tracer_id,
            trace.parent_id,
            trace.elapsed_ms
        )?;
    }
    Ok(())
}
