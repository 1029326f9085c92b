//! Logger facade
//!
//! A [`Logger`] is a cheap `Clone` handle. Every call checks the level gate
//! first; a disabled level returns `None` without building a message. An
//! enabled call builds one [`LogMessage`], submits it to the shared
//! pipeline and returns it.
//!
//! No logging call returns an error or lets a panic escape. Problems are
//! reported through the [last-chance logger](super::last_chance).

use super::async_buffer::{BufferOptions, DEFAULT_CLOSE_TIMEOUT};
use super::config::LoggingConfig;
use super::correlation::CorrelationContext;
use super::error::{LoggerError, Result};
use super::last_chance;
use super::level_gate::LevelGate;
use super::log_level::LogLevel;
use super::log_message::{LogEvent, LogMessage, MessageOrigin, TraceInfo};
use super::message_buffer::{MessageBuffer, MessagePipeline};
use super::metrics::PipelineMetrics;
use super::persister::Persister;
use super::process_context::ProcessContext;
use super::runtime_context::RuntimeContext;
use super::text_format;
use super::trace_probe::{TraceProbe, DEFAULT_TRACE_CATEGORY};
use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe, Location};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_LOGGER_NAME: &str = "default";

#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    gate: Arc<LevelGate>,
    pipeline: Arc<MessagePipeline>,
    process: Arc<ProcessContext>,
    correlation: Arc<CorrelationContext>,
    capture_stack: bool,
}

/// Generates the five entry points of one severity
macro_rules! severity_methods {
    ($level:expr, $plain:ident, $fmt:ident, $error:ident, $event:ident, $message:ident, $enabled:ident) => {
        #[track_caller]
        pub fn $plain(&self, text: impl Into<String>) -> Option<Arc<LogMessage>> {
            self.log($level, text)
        }

        /// Expand `{0}`-style placeholders; a bad template logs fallback text
        #[track_caller]
        pub fn $fmt(&self, template: &str, args: &[&dyn Display]) -> Option<Arc<LogMessage>> {
            self.log_fmt($level, template, args)
        }

        /// Log an error's description with the error attached
        #[track_caller]
        pub fn $error(&self, error: &dyn std::error::Error) -> Option<Arc<LogMessage>> {
            self.log_error($level, error)
        }

        #[track_caller]
        pub fn $event(&self, event: LogEvent<'_>) -> Option<Arc<LogMessage>> {
            self.log_event($level, event)
        }

        /// Submit a prepared message at this severity
        #[track_caller]
        pub fn $message(&self, mut message: LogMessage) -> Option<Arc<LogMessage>> {
            message.set_level($level);
            self.write_message(message)
        }

        #[inline]
        pub fn $enabled(&self) -> bool {
            self.gate.is_enabled($level)
        }
    };
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Logger configured entirely from `config`
    pub fn from_config(config: LoggingConfig) -> Result<Self> {
        LoggerBuilder::new().config(config).build()
    }

    severity_methods!(LogLevel::Debug, debug, debug_fmt, debug_error, debug_event, debug_message, is_debug_enabled);
    severity_methods!(LogLevel::Trace, trace, trace_fmt, trace_error, trace_event, trace_message, is_trace_enabled);
    severity_methods!(LogLevel::Information, info, info_fmt, info_error, info_event, info_message, is_info_enabled);
    severity_methods!(LogLevel::Warning, warn, warn_fmt, warn_error, warn_event, warn_message, is_warn_enabled);
    severity_methods!(LogLevel::Error, error, error_fmt, error_error, error_event, error_message, is_error_enabled);
    severity_methods!(LogLevel::Critical, critical, critical_fmt, critical_error, critical_event, critical_message, is_critical_enabled);

    #[track_caller]
    pub fn log(&self, level: LogLevel, text: impl Into<String>) -> Option<Arc<LogMessage>> {
        let caller = Location::caller();
        if !self.admit(level) {
            return None;
        }
        self.guarded(level, || self.build(level, text.into(), caller))
    }

    #[track_caller]
    pub fn log_fmt(
        &self,
        level: LogLevel,
        template: &str,
        args: &[&dyn Display],
    ) -> Option<Arc<LogMessage>> {
        let caller = Location::caller();
        if !self.admit(level) {
            return None;
        }
        self.guarded(level, || {
            let text = text_format::format_or_fallback(template, args);
            self.build(level, text, caller)
        })
    }

    #[track_caller]
    pub fn log_error(&self, level: LogLevel, error: &dyn std::error::Error) -> Option<Arc<LogMessage>> {
        let caller = Location::caller();
        if !self.admit(level) {
            return None;
        }
        self.guarded(level, || self.build(level, error.to_string(), caller).with_error(error))
    }

    #[track_caller]
    pub fn log_event(&self, level: LogLevel, event: LogEvent<'_>) -> Option<Arc<LogMessage>> {
        let caller = Location::caller();
        if !self.admit(level) {
            return None;
        }
        self.guarded(level, || event.apply(self.build(level, event.resolve_text(), caller)))
    }

    /// Submit a prepared message at its own level.
    ///
    /// Identity fields left empty are filled from this logger.
    pub fn write_message(&self, mut message: LogMessage) -> Option<Arc<LogMessage>> {
        let level = message.level();
        if !self.admit(level) {
            return None;
        }
        self.guarded(level, move || {
            message.fill_identity(&self.origin());
            message
        })
    }

    /// Start a trace probe in the default `Code` category
    #[track_caller]
    pub fn new_trace(&self) -> TraceProbe {
        TraceProbe::start(self, DEFAULT_TRACE_CATEGORY)
    }

    #[track_caller]
    pub fn new_trace_in(&self, category: impl Into<String>) -> TraceProbe {
        TraceProbe::start(self, category)
    }

    /// Trace probe output; the probe has already checked the gate
    pub(crate) fn emit_trace(&self, text: String, trace: TraceInfo, caller: &Location<'_>) {
        self.guarded(LogLevel::Trace, || {
            self.build(LogLevel::Trace, text, caller).with_trace(trace)
        });
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.gate.is_enabled(level)
    }

    pub fn enable(&self, level: LogLevel) {
        self.gate.enable(level);
    }

    pub fn disable(&self, level: LogLevel) {
        self.gate.disable(level);
    }

    pub fn set_level_enabled(&self, level: LogLevel, enabled: bool) {
        self.gate.set(level, enabled);
    }

    /// Enable `level` and everything above it, disable the rest
    pub fn set_minimum_level(&self, level: LogLevel) {
        self.gate.set_minimum(level);
    }

    pub fn gate(&self) -> &LevelGate {
        &self.gate
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same pipeline under another logger name, with its own copy of the gate
    pub fn named(&self, name: impl Into<String>) -> Logger {
        Logger {
            name: Arc::from(name.into()),
            gate: Arc::new((*self.gate).clone()),
            ..self.clone()
        }
    }

    /// Same logger stamping messages with an explicit correlation context
    pub fn with_correlation(&self, correlation: Arc<CorrelationContext>) -> Logger {
        Logger {
            correlation,
            ..self.clone()
        }
    }

    pub fn correlation(&self) -> &Arc<CorrelationContext> {
        &self.correlation
    }

    pub fn process(&self) -> &ProcessContext {
        &self.process
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        self.pipeline.metrics()
    }

    /// Messages submitted but not yet handed to the persister
    pub fn pending(&self) -> usize {
        self.pipeline.pending_len()
    }

    /// Persist everything submitted so far and wait for it
    pub fn flush(&self) -> Result<()> {
        self.pipeline.flush()
    }

    /// Drain the pipeline and close the persister.
    ///
    /// Shared by every clone; later calls on any clone are rejected and
    /// reported.
    pub fn close(&self) {
        self.pipeline.close();
    }

    /// Bounded [`close`](Self::close); `false` if the drain did not finish
    pub fn close_timeout(&self, timeout: Duration) -> bool {
        self.pipeline.close_timeout(timeout)
    }

    pub fn is_closed(&self) -> bool {
        !self.pipeline.is_running()
    }

    fn origin(&self) -> MessageOrigin<'_> {
        MessageOrigin {
            process: &self.process,
            activity_id: self.correlation.activity_id(),
            logger_name: &self.name,
        }
    }

    #[inline]
    fn admit(&self, level: LogLevel) -> bool {
        self.gate.is_enabled(level)
    }

    fn build(&self, level: LogLevel, text: String, caller: &Location<'_>) -> LogMessage {
        LogMessage::build(level, text, &self.origin(), caller)
    }

    /// Run `make`, attach runtime context, submit. Panics are contained.
    fn guarded<F>(&self, level: LogLevel, make: F) -> Option<Arc<LogMessage>>
    where
        F: FnOnce() -> LogMessage,
    {
        match catch_unwind(AssertUnwindSafe(|| self.submit(make()))) {
            Ok(message) => Some(message),
            Err(payload) => {
                let err = LoggerError::panicked(format!("{} {} call", self.name, level), &*payload);
                last_chance::log(LogLevel::Error, &err.to_string());
                None
            }
        }
    }

    fn submit(&self, mut message: LogMessage) -> Arc<LogMessage> {
        if message.level().captures_runtime_context() && message.runtime_context.is_none() {
            message.runtime_context = Some(RuntimeContext::capture(
                &self.process,
                &self.correlation,
                self.capture_stack,
            ));
        }

        let message = Arc::new(message);
        if let Err(e) = self.pipeline.submit(Arc::clone(&message)) {
            let occurrence = self.metrics().rejected().saturating_sub(1);
            last_chance::log_rate_limited(
                LogLevel::Warning,
                occurrence,
                &format!("{}: message not queued: {}", self.name, e),
            );
        }
        message
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("gate", &self.gate)
            .field("application_key", &self.process.application_key)
            .field("activity_id", &self.correlation.activity_id())
            .finish()
    }
}

/// Builder for [`Logger`]
///
/// # Example
/// ```
/// use rust_paged_logger::prelude::*;
/// use std::time::Duration;
///
/// let logger = Logger::builder()
///     .name("orders")
///     .minimum_level(LogLevel::Debug)
///     .page_size(50)
///     .flush_interval(Duration::from_millis(100))
///     .persister(MemoryPersister::new())
///     .build()
///     .unwrap();
///
/// logger.info("ready");
/// logger.close();
/// ```
pub struct LoggerBuilder {
    config: LoggingConfig,
    name: String,
    persister: Option<Box<dyn Persister>>,
    process: Option<ProcessContext>,
    correlation: Option<Arc<CorrelationContext>>,
    gate: Option<LevelGate>,
    close_timeout: Duration,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self {
            config: LoggingConfig::default(),
            name: DEFAULT_LOGGER_NAME.to_string(),
            persister: None,
            process: None,
            correlation: None,
            gate: None,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// Start from a full configuration; later builder calls override it
    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: LoggingConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn application_key(mut self, key: impl Into<String>) -> Self {
        self.config.application_key = Some(key.into());
        self
    }

    /// Initial gate: `level` and above
    #[must_use = "builder methods return a new value"]
    pub fn minimum_level(mut self, level: LogLevel) -> Self {
        self.config.minimum_level = level;
        self.gate = None;
        self
    }

    /// Initial gate: exactly these levels
    #[must_use = "builder methods return a new value"]
    pub fn enabled_levels(mut self, levels: &[LogLevel]) -> Self {
        self.gate = Some(LevelGate::only(levels));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = Some(capacity);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn capture_stack(mut self, enabled: bool) -> Self {
        self.config.capture_stack = enabled;
        self
    }

    /// Use this persister instead of the one named by the configuration
    #[must_use = "builder methods return a new value"]
    pub fn persister<P: Persister + 'static>(mut self, persister: P) -> Self {
        self.persister = Some(Box::new(persister));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn boxed_persister(mut self, persister: Box<dyn Persister>) -> Self {
        self.persister = Some(persister);
        self
    }

    /// Fixed identity instead of resolving it from the environment
    #[must_use = "builder methods return a new value"]
    pub fn process_context(mut self, process: ProcessContext) -> Self {
        self.process = Some(process);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn correlation(mut self, correlation: Arc<CorrelationContext>) -> Self {
        self.correlation = Some(correlation);
        self
    }

    pub fn build(self) -> Result<Logger> {
        let config = self.config;
        config.validate()?;

        if let Some(path) = &config.last_chance_path {
            if !last_chance::set_file(path) {
                last_chance::log(
                    LogLevel::Warning,
                    &format!("Cannot open last-chance file {}", path.display()),
                );
            }
        }

        let process = self.process.unwrap_or_else(|| ProcessContext::resolve(&config));
        let persister = match self.persister {
            Some(persister) => persister,
            None => crate::persisters::from_config(&config, &process),
        };
        let options = BufferOptions {
            page_size: config.page_size,
            flush_interval: config.flush_interval,
            capacity: config.queue_capacity,
            thread_name: format!("paged-log-{}", self.name),
        };
        let pipeline = MessageBuffer::start(persister, options, Arc::new(PipelineMetrics::new()))
            .inspect_err(|e| {
                last_chance::log_error(LogLevel::Critical, "Cannot start logging pipeline", e)
            })?;

        let gate = self
            .gate
            .unwrap_or_else(|| LevelGate::at_least(config.minimum_level));

        Ok(Logger {
            name: Arc::from(self.name),
            gate: Arc::new(gate),
            pipeline: Arc::new(pipeline),
            process: Arc::new(process),
            correlation: self
                .correlation
                .unwrap_or_else(|| CorrelationContext::new().shared()),
            capture_stack: config.capture_stack,
        })
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persisters::{MemoryPersister, MemoryStore};

    fn memory_logger() -> (Logger, MemoryStore) {
        let persister = MemoryPersister::new();
        let store = persister.store();
        let logger = Logger::builder()
            .name("unit")
            .process_context(ProcessContext::fixed("app", "test", "host"))
            .capture_stack(false)
            .flush_interval(Duration::from_secs(60))
            .persister(persister)
            .build()
            .unwrap();
        (logger, store)
    }

    #[test]
    fn test_default_gate() {
        let (logger, _) = memory_logger();
        assert!(!logger.is_debug_enabled());
        assert!(!logger.is_trace_enabled());
        assert!(logger.is_info_enabled());
        assert!(logger.is_warn_enabled());
        assert!(logger.is_error_enabled());
        assert!(logger.is_critical_enabled());
        assert!(!logger.is_enabled(LogLevel::Off));
    }

    #[test]
    fn test_disabled_level_returns_none() {
        let (logger, store) = memory_logger();
        assert!(logger.debug("hidden").is_none());
        assert!(logger.debug_fmt("{0}", &[&1]).is_none());
        assert!(logger.error_fmt("{0}", &[&1]).is_some());

        let metrics = logger.metrics();
        assert_eq!(metrics.submitted(), 1);
        assert_eq!(metrics.rejected(), 0);
        logger.close();
        assert_eq!(store.texts(), vec!["1"]);
    }

    #[test]
    fn test_enabled_call_returns_submitted_message() {
        let (logger, store) = memory_logger();
        let msg = logger.info("hello").unwrap();
        assert_eq!(msg.application_key, "app");
        assert_eq!(msg.logger_name, "unit");
        assert_eq!(msg.activity_id, logger.correlation().activity_id());
        assert!(msg.caller.as_ref().unwrap().file.ends_with("logger.rs"));
        logger.close();
        assert!(Arc::ptr_eq(&store.messages()[0], &msg));
    }

    #[test]
    fn test_runtime_context_only_for_warning_and_above() {
        let (logger, _) = memory_logger();
        assert!(logger.info("i").unwrap().runtime_context.is_none());
        let warn = logger.warn("w").unwrap();
        let ctx = warn.runtime_context.as_ref().unwrap();
        assert_eq!(ctx.machine.host_name, "host");
        assert!(ctx.machine.stack.is_none());
        logger.close();
    }

    #[test]
    fn test_bad_template_logs_fallback() {
        let (logger, _) = memory_logger();
        let msg = logger.error_fmt("value {0} of {1}", &[&5]).unwrap();
        assert!(msg
            .message_text
            .starts_with("Unable to format message 'value {0} of {1}' with 1 argument(s)"));
        logger.close();
    }

    #[test]
    fn test_event_combination() {
        let (logger, _) = memory_logger();
        let err = LoggerError::other("db down");
        let args: [&dyn Display; 1] = [&"orders"];
        let msg = logger
            .critical_event(
                LogEvent::new()
                    .number(500)
                    .error(&err)
                    .template("cannot reach {0}", &args)
                    .sub_key("db"),
            )
            .unwrap();

        assert_eq!(msg.message_text, "cannot reach orders");
        assert_eq!(msg.message_number, 500);
        assert_eq!(msg.sub_key.as_deref(), Some("db"));
        assert_eq!(msg.error.as_ref().unwrap().description, "db down");
        logger.close();
    }

    #[test]
    fn test_message_overload_sets_level() {
        let (logger, _) = memory_logger();
        let prepared = LogMessage::new(LogLevel::Debug, "prepared");
        let msg = logger.error_message(prepared).unwrap();
        assert_eq!(msg.level(), LogLevel::Error);
        assert_eq!(msg.application_key, "app");
        logger.close();
    }

    #[test]
    fn test_dynamic_gate() {
        let (logger, _) = memory_logger();
        logger.enable(LogLevel::Debug);
        assert!(logger.debug("now visible").is_some());
        logger.disable(LogLevel::Information);
        assert!(logger.info("hidden").is_none());
        logger.set_minimum_level(LogLevel::Error);
        assert!(logger.warn("hidden").is_none());
        assert!(logger.error("shown").is_some());
        logger.set_level_enabled(LogLevel::Warning, true);
        assert!(logger.is_warn_enabled());
        logger.close();
    }

    #[test]
    fn test_named_logger_has_own_gate() {
        let (logger, _) = memory_logger();
        let child = logger.named("child");
        child.enable(LogLevel::Debug);

        assert!(child.is_debug_enabled());
        assert!(!logger.is_debug_enabled());
        assert_eq!(child.info("x").unwrap().logger_name, "child");
        logger.close();
    }

    #[test]
    fn test_with_correlation() {
        let (logger, _) = memory_logger();
        let ctx = CorrelationContext::new().with_request("GET /health").shared();
        let scoped = logger.with_correlation(Arc::clone(&ctx));

        let msg = scoped.warn("slow").unwrap();
        assert_eq!(msg.activity_id, ctx.activity_id());
        assert_eq!(
            msg.runtime_context.as_ref().unwrap().request.as_deref(),
            Some("GET /health")
        );
        logger.close();
    }

    #[test]
    fn test_log_after_close_is_contained() {
        let (logger, store) = memory_logger();
        logger.info("before");
        logger.close();

        assert!(logger.is_closed());
        assert!(logger.info("after").is_some());
        assert_eq!(logger.metrics().rejected(), 1);
        assert_eq!(store.texts(), vec!["before"]);
    }

    #[test]
    fn test_panicking_display_is_contained() {
        struct Explodes;
        impl Display for Explodes {
            fn fmt(&self, _: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                panic!("display exploded")
            }
        }

        let (logger, _) = memory_logger();
        assert!(logger.info_fmt("{0}", &[&Explodes]).is_none());
        logger.close();
    }
}
