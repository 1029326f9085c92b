//! # Rust Paged Logger
//!
//! Buffered, asynchronous logging for long-running processes.
//!
//! Callers submit [`LogMessage`]s through a [`Logger`]; a background worker
//! groups them into pages and hands each page to a [`Persister`]. Logging
//! calls never block on I/O and never return errors. Failures inside the
//! pipeline go to the [last-chance logger](core::last_chance).
//!
//! ## Features
//!
//! - **Level gate**: per-level switches checked before any work is done
//! - **Paged delivery**: pages of a fixed size, plus a periodic partial flush
//! - **Rolling files**: size, time or hybrid rollover with optional gzip
//! - **Tracing**: scoped enter/exit probes linked by activity id
//!
//! ```
//! use rust_paged_logger::prelude::*;
//!
//! let logger = Logger::builder()
//!     .application_key("billing")
//!     .persister(MemoryPersister::new())
//!     .build()
//!     .unwrap();
//!
//! logger.info("invoice created");
//! logger.warn_fmt("retry {0} of {1}", &[&2, &5]);
//! logger.close();
//! ```

pub mod core;
pub mod macros;
pub mod persisters;

pub mod prelude {
    pub use crate::core::{
        CorrelationContext, LevelGate, LogEvent, LogLevel, LogMessage, Logger, LoggerBuilder,
        LoggerError, LoggingConfig, MessagePriority, PersisterKind, PipelineMetrics, RecordFormat,
        Result, TimestampFormat, TraceProbe,
    };
    pub use crate::persisters::{
        ConsolePersister, MemoryPersister, MemoryStore, Persister, RollPolicy, RollStrategy,
        RollingFilePersister,
    };
}

pub use crate::core::{
    last_chance, CorrelationContext, LevelGate, LogEvent, LogLevel, LogMessage, Logger,
    LoggerBuilder, LoggerError, LoggingConfig, MessagePriority, Persister, PersisterKind,
    PipelineMetrics, ProcessContext, RecordFormat, Result, TimestampFormat, TraceProbe,
};
pub use crate::persisters::{ConsolePersister, MemoryPersister, RollingFilePersister};
