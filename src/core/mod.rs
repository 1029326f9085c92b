//! Core logger types and traits

pub mod async_buffer;
pub mod config;
pub mod correlation;
pub mod error;
pub mod last_chance;
pub mod level_gate;
pub mod log_level;
pub mod log_message;
pub mod logger;
pub mod message_buffer;
pub mod metrics;
pub mod persister;
pub mod priority;
pub mod process_context;
pub mod record_format;
pub mod runtime_context;
pub mod text_format;
pub mod timestamp;
pub mod trace_probe;

pub use async_buffer::{AsyncBuffer, BufferHandler, BufferOptions, BufferState, DEFAULT_CLOSE_TIMEOUT};
pub use config::{LoggingConfig, PersisterKind};
pub use correlation::CorrelationContext;
pub use error::{LoggerError, Result};
pub use level_gate::LevelGate;
pub use log_level::LogLevel;
pub use log_message::{
    CallerInfo, ErrorDetail, LogEvent, LogMessage, MessageClass, TraceDirection, TraceInfo,
};
pub use logger::{Logger, LoggerBuilder};
pub use message_buffer::{MessageBuffer, MessagePipeline};
pub use metrics::PipelineMetrics;
pub use persister::Persister;
pub use priority::MessagePriority;
pub use process_context::ProcessContext;
pub use record_format::RecordFormat;
pub use runtime_context::{MachineContext, RuntimeContext};
pub use timestamp::TimestampFormat;
pub use trace_probe::TraceProbe;
