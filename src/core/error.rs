//! Error types for the logging pipeline
//!
//! Logging calls never surface these to the application. They travel from
//! builders and configuration to the caller, and from the worker to the
//! last-chance logger.

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("I/O failure during {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O failure: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON record error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A bounded buffer is at capacity
    #[error("Log buffer full: {current}/{max} messages pending")]
    QueueFull { current: usize, max: usize },

    /// Submitted after close began
    #[error("Log buffer is closed")]
    BufferClosed,

    #[error("Bad setting '{component}': {message}")]
    InvalidConfiguration { component: String, message: String },

    #[error("Required setting '{key}' is missing")]
    MissingSetting { key: String },

    #[error("Persister '{persister}' failed: {message}")]
    PersisterError { persister: String, message: String },

    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// A record could not be rendered in the named format
    #[error("Cannot render {format_type} record: {message}")]
    FormatterError { format_type: String, message: String },

    /// Caught from `catch_unwind` around a handler, persister or call
    #[error("Panic in {location}: {message}")]
    Panicked { location: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// I/O error annotated with what was being attempted
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    pub fn queue_full(current: usize, max: usize) -> Self {
        Self::QueueFull { current, max }
    }

    /// `component` names the offending setting or part
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn missing_setting(key: impl Into<String>) -> Self {
        Self::MissingSetting { key: key.into() }
    }

    pub fn persister(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PersisterError {
            persister: name.into(),
            message: reason.into(),
        }
    }

    pub fn file_rotation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FileRotationError {
            path: path.into(),
            message: reason.into(),
        }
    }

    pub fn formatter(format_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FormatterError {
            format_type: format_type.into(),
            message: reason.into(),
        }
    }

    /// Wrap a `catch_unwind` payload
    pub fn panicked(location: impl Into<String>, payload: &(dyn std::any::Any + Send)) -> Self {
        Self::Panicked {
            location: location.into(),
            message: panic_message(payload),
        }
    }

    pub fn other(text: impl Into<String>) -> Self {
        Self::Other(text.into())
    }
}

/// Text of a panic payload; `&str` and `String` payloads are recognized
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    match payload.downcast_ref::<&str>() {
        Some(text) => (*text).to_string(),
        None => payload
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_else(|| "non-string panic payload".to_string()),
    }
}
