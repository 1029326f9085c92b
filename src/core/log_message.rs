//! Log message value type
//!
//! A [`LogMessage`] is built on the calling thread, frozen in an `Arc` when
//! it is submitted, and read by the persister on the worker thread.

use super::log_level::LogLevel;
use super::priority::MessagePriority;
use super::process_context::ProcessContext;
use super::runtime_context::RuntimeContext;
use super::text_format;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::panic::Location;
use uuid::Uuid;

/// Longest message text shown in a title before it is cut
const TITLE_TEXT_LIMIT: usize = 60;

pub const APPLICATION_MESSAGE_TYPE: &str = "LogMessage";
pub const TRACE_MESSAGE_TYPE: &str = "TraceMessage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageClass {
    #[default]
    ApplicationLogging,
    Tracing,
}

impl Display for MessageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageClass::ApplicationLogging => write!(f, "ApplicationLogging"),
            MessageClass::Tracing => write!(f, "Tracing"),
        }
    }
}

/// Source location of the logging call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerInfo {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl CallerInfo {
    pub fn from_location(location: &Location<'_>) -> Self {
        Self {
            file: location.file().to_string(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl Display for CallerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Error bound to a message: its description plus the `source()` chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chain: Vec<String>,
}

impl ErrorDetail {
    pub fn capture(error: &dyn std::error::Error) -> Self {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(inner) = source {
            chain.push(inner.to_string());
            source = inner.source();
        }
        Self {
            description: error.to_string(),
            chain,
        }
    }

    /// Multi-line rendering with one `caused by:` line per source
    pub fn expanded(&self) -> String {
        let mut text = self.description.clone();
        for cause in &self.chain {
            text.push_str("\n  caused by: ");
            text.push_str(cause);
        }
        text
    }
}

impl Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expanded())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceDirection {
    Enter,
    Exit,
}

impl Display for TraceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceDirection::Enter => write!(f, "Enter"),
            TraceDirection::Exit => write!(f, "Exit"),
        }
    }
}

/// Timing and nesting data carried by trace probe messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceInfo {
    pub category: String,
    pub tracer_id: Uuid,
    /// Enclosing operation, or the nil id at the outermost level
    pub parent_id: Uuid,
    pub direction: TraceDirection,
    pub enter_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub elapsed_ms: u64,
}

/// Identity stamped on messages built by one logger
pub(crate) struct MessageOrigin<'a> {
    pub process: &'a ProcessContext,
    pub activity_id: Uuid,
    pub logger_name: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub timestamp: DateTime<Utc>,
    level: LogLevel,
    priority: MessagePriority,
    #[serde(default)]
    priority_overridden: bool,
    pub message_text: String,
    pub message_number: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    pub application_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_key: Option<String>,
    pub environment: String,
    pub host_name: String,
    pub logger_name: String,
    pub activity_id: Uuid,
    pub message_class: MessageClass,
    pub message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller: Option<CallerInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_context: Option<RuntimeContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceInfo>,
}

impl LogMessage {
    /// Stand-alone message with no identity yet.
    ///
    /// Identity fields left empty are filled in by the logger the message
    /// is written to.
    #[track_caller]
    pub fn new(level: LogLevel, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            priority: level.priority(),
            priority_overridden: false,
            message_text: text.into(),
            message_number: 0,
            error: None,
            application_key: String::new(),
            sub_key: None,
            environment: String::new(),
            host_name: String::new(),
            logger_name: String::new(),
            activity_id: Uuid::nil(),
            message_class: MessageClass::ApplicationLogging,
            message_type: APPLICATION_MESSAGE_TYPE.to_string(),
            caller: Some(CallerInfo::from_location(Location::caller())),
            runtime_context: None,
            trace: None,
        }
    }

    /// The single construction path used by loggers
    pub(crate) fn build(
        level: LogLevel,
        text: String,
        origin: &MessageOrigin<'_>,
        caller: &Location<'_>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            priority: level.priority(),
            priority_overridden: false,
            message_text: text,
            message_number: 0,
            error: None,
            application_key: origin.process.application_key.clone(),
            sub_key: None,
            environment: origin.process.environment.clone(),
            host_name: origin.process.host_name.clone(),
            logger_name: origin.logger_name.to_string(),
            activity_id: origin.activity_id,
            message_class: MessageClass::ApplicationLogging,
            message_type: APPLICATION_MESSAGE_TYPE.to_string(),
            caller: Some(CallerInfo::from_location(caller)),
            runtime_context: None,
            trace: None,
        }
    }

    /// Fill identity fields the caller left empty
    pub(crate) fn fill_identity(&mut self, origin: &MessageOrigin<'_>) {
        if self.application_key.is_empty() {
            self.application_key = origin.process.application_key.clone();
        }
        if self.environment.is_empty() {
            self.environment = origin.process.environment.clone();
        }
        if self.host_name.is_empty() {
            self.host_name = origin.process.host_name.clone();
        }
        if self.logger_name.is_empty() {
            self.logger_name = origin.logger_name.to_string();
        }
        if self.activity_id.is_nil() {
            self.activity_id = origin.activity_id;
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn priority(&self) -> MessagePriority {
        self.priority
    }

    pub fn is_priority_overridden(&self) -> bool {
        self.priority_overridden
    }

    /// Change the severity. A priority that was never overridden follows
    /// the new level.
    pub fn set_level(&mut self, level: LogLevel) {
        self.level = level;
        if !self.priority_overridden {
            self.priority = level.priority();
        }
    }

    /// Pin the priority; the level is untouched
    pub fn override_priority(&mut self, priority: MessagePriority) {
        self.priority = priority;
        self.priority_overridden = true;
    }

    #[must_use]
    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.override_priority(priority);
        self
    }

    #[must_use]
    pub fn with_number(mut self, number: i32) -> Self {
        self.message_number = number;
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: &dyn std::error::Error) -> Self {
        self.error = Some(ErrorDetail::capture(error));
        self
    }

    #[must_use]
    pub fn with_sub_key(mut self, sub_key: impl Into<String>) -> Self {
        self.sub_key = Some(sub_key.into());
        self
    }

    #[must_use]
    pub fn with_runtime_context(mut self, context: RuntimeContext) -> Self {
        self.runtime_context = Some(context);
        self
    }

    #[must_use]
    pub fn with_trace(mut self, trace: TraceInfo) -> Self {
        self.message_class = MessageClass::Tracing;
        self.message_type = TRACE_MESSAGE_TYPE.to_string();
        self.trace = Some(trace);
        self
    }

    /// One-line summary: `"{app} {level}({priority}) {number:04} {text}"`,
    /// with the text cut to 60 characters
    pub fn title(&self) -> String {
        let text = if self.message_text.chars().count() > TITLE_TEXT_LIMIT {
            let cut: String = self.message_text.chars().take(TITLE_TEXT_LIMIT).collect();
            format!("{}...", cut)
        } else {
            self.message_text.clone()
        };
        format!(
            "{} {}({}) {:04} {}",
            self.application_key, self.level, self.priority, self.message_number, text
        )
    }
}

/// Everything a single logging call can combine
///
/// Text resolution order: template with arguments, then plain text, then
/// the bound error's description.
#[derive(Default)]
pub struct LogEvent<'a> {
    message_number: Option<i32>,
    error: Option<&'a dyn std::error::Error>,
    text: Option<String>,
    template: Option<(&'a str, &'a [&'a dyn Display])>,
    sub_key: Option<String>,
}

impl<'a> LogEvent<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn number(mut self, number: i32) -> Self {
        self.message_number = Some(number);
        self
    }

    #[must_use]
    pub fn error(mut self, error: &'a dyn std::error::Error) -> Self {
        self.error = Some(error);
        self
    }

    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn template(mut self, template: &'a str, args: &'a [&'a dyn Display]) -> Self {
        self.template = Some((template, args));
        self
    }

    #[must_use]
    pub fn sub_key(mut self, sub_key: impl Into<String>) -> Self {
        self.sub_key = Some(sub_key.into());
        self
    }

    /// Final message text; formatting failures become fallback text
    pub(crate) fn resolve_text(&self) -> String {
        if let Some((template, args)) = self.template {
            return text_format::format_or_fallback(template, args);
        }
        if let Some(text) = &self.text {
            return text.clone();
        }
        self.error.map(|e| e.to_string()).unwrap_or_default()
    }

    /// Copy the number, error and sub key onto a built message
    pub(crate) fn apply(&self, mut message: LogMessage) -> LogMessage {
        if let Some(number) = self.message_number {
            message.message_number = number;
        }
        if let Some(error) = self.error {
            message.error = Some(ErrorDetail::capture(error));
        }
        if let Some(sub_key) = &self.sub_key {
            message.sub_key = Some(sub_key.clone());
        }
        message
    }
}
