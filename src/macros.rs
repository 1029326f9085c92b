//! Logging macros with `format!`-style arguments.
//!
//! The level is checked before the arguments are formatted, so a disabled
//! level costs one atomic load.
//!
//! # Examples
//!
//! ```
//! use rust_paged_logger::prelude::*;
//! use rust_paged_logger::info;
//!
//! let logger = Logger::builder().persister(MemoryPersister::new()).build().unwrap();
//!
//! info!(logger, "Server started");
//!
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//! logger.close();
//! ```

/// Log at an explicit level.
///
/// Evaluates to the submitted message, or `None` when the level is disabled.
///
/// ```
/// # use rust_paged_logger::prelude::*;
/// # let logger = Logger::builder().persister(MemoryPersister::new()).build().unwrap();
/// use rust_paged_logger::log;
/// log!(logger, LogLevel::Information, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// # logger.close();
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        let logger = &$logger;
        let level = $level;
        if logger.is_enabled(level) {
            logger.log(level, format!($($arg)+))
        } else {
            ::std::option::Option::None
        }
    }};
}

/// Log a debug-level message
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

/// Log a trace-level message.
///
/// ```
/// # use rust_paged_logger::prelude::*;
/// # let logger = Logger::builder().persister(MemoryPersister::new()).build().unwrap();
/// # logger.enable(LogLevel::Trace);
/// use rust_paged_logger::trace;
/// trace!(logger, "Entering function: calculate()");
/// trace!(logger, "Variable value: {}", 42);
/// # logger.close();
/// ```
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $($arg)+)
    };
}

/// Log an information-level message
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Information, $($arg)+)
    };
}

/// Log a warning-level message
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warning, $($arg)+)
    };
}

/// Log an error-level message.
///
/// ```
/// # use rust_paged_logger::prelude::*;
/// # let logger = Logger::builder().persister(MemoryPersister::new()).build().unwrap();
/// use rust_paged_logger::error;
/// error!(logger, "Failed to connect to {}", "db-01");
/// # logger.close();
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a critical-level message
#[macro_export]
macro_rules! critical {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Critical, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use std::time::Duration;

    #[test]
    fn test_macros_format_and_gate() {
        let persister = MemoryPersister::new();
        let store = persister.store();
        let logger = Logger::builder()
            .flush_interval(Duration::from_secs(60))
            .persister(persister)
            .build()
            .unwrap();

        assert!(crate::debug!(logger, "hidden {}", 1).is_none());
        crate::info!(logger, "port {}", 8080);
        crate::warn!(logger, "disk at {}%", 91);
        crate::error!(logger, "code {}", 500);
        crate::critical!(logger, "{} down", "db");
        crate::log!(logger, LogLevel::Information, "plain");
        logger.close();

        assert_eq!(
            store.texts(),
            vec!["port 8080", "disk at 91%", "code 500", "db down", "plain"]
        );
        assert_eq!(logger.metrics().submitted(), 5);
    }

    #[test]
    fn test_macro_records_call_site() {
        let logger = Logger::builder()
            .persister(MemoryPersister::new())
            .build()
            .unwrap();
        let msg = crate::info!(logger, "here").unwrap();
        let caller = msg.caller.as_ref().unwrap();
        assert!(caller.file.ends_with("macros.rs"));
        logger.close();
    }
}
