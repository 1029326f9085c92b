//! Scoped trace probe
//!
//! A [`TraceProbe`] marks one logical operation. Creating it pushes a new
//! tracer id onto the calling thread's operation stack and emits `Enter
//! <category>`; dropping it (on any exit path, unwinding included) pops
//! the id and emits `Exit <category>` with the elapsed time.
//!
//! ```
//! use rust_paged_logger::{LogLevel, Logger};
//! use rust_paged_logger::persisters::MemoryPersister;
//!
//! let logger = Logger::builder()
//!     .persister(MemoryPersister::new())
//!     .minimum_level(LogLevel::Debug)
//!     .build()
//!     .unwrap();
//! {
//!     let _probe = logger.new_trace_in("LoadOrders");
//!     // ... work ...
//! }
//! logger.close();
//! ```

use super::log_message::{TraceDirection, TraceInfo};
use super::log_level::LogLevel;
use super::logger::Logger;
use chrono::{DateTime, Utc};
use std::panic::Location;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const DEFAULT_TRACE_CATEGORY: &str = "Code";

pub struct TraceProbe {
    logger: Logger,
    category: String,
    tracer_id: Uuid,
    parent_id: Uuid,
    enter_time: DateTime<Utc>,
    started: Instant,
    enabled: bool,
    running: bool,
    caller: &'static Location<'static>,
    thread: ThreadId,
}

impl TraceProbe {
    /// Start a probe. Disabled probes (trace level off at creation) touch
    /// neither the correlation stack nor the buffer.
    #[track_caller]
    pub(crate) fn start(logger: &Logger, category: impl Into<String>) -> Self {
        let caller = Location::caller();
        let enabled = logger.is_enabled(LogLevel::Trace);
        let tracer_id = Uuid::new_v4();
        let mut probe = Self {
            logger: logger.clone(),
            category: category.into(),
            tracer_id,
            parent_id: Uuid::nil(),
            enter_time: Utc::now(),
            started: Instant::now(),
            enabled,
            running: true,
            caller,
            thread: thread::current().id(),
        };

        if enabled {
            probe.parent_id = logger
                .correlation()
                .push_operation(tracer_id)
                .unwrap_or_else(Uuid::nil);
            probe.emit(TraceDirection::Enter, None, 0);
        }
        probe
    }

    /// Stop the probe now instead of at scope end. Calling it twice is a no-op.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        if !self.enabled {
            return;
        }

        let elapsed = self.started.elapsed();
        self.logger
            .correlation()
            .pop_operation(self.thread, self.tracer_id);
        self.emit(
            TraceDirection::Exit,
            Some(Utc::now()),
            u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        );
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn tracer_id(&self) -> Uuid {
        self.tracer_id
    }

    /// Enclosing probe's tracer id, or nil at the outermost level
    pub fn parent_id(&self) -> Uuid {
        self.parent_id
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn emit(&self, direction: TraceDirection, exit_time: Option<DateTime<Utc>>, elapsed_ms: u64) {
        let trace = TraceInfo {
            category: self.category.clone(),
            tracer_id: self.tracer_id,
            parent_id: self.parent_id,
            direction,
            enter_time: self.enter_time,
            exit_time,
            elapsed_ms,
        };
        self.logger.emit_trace(
            format!("{} {}", direction, self.category),
            trace,
            self.caller,
        );
    }
}

impl Drop for TraceProbe {
    fn drop(&mut self) {
        self.stop();
    }
}
