//! Bridge between the generic buffer and a persister

use super::async_buffer::{AsyncBuffer, BufferHandler, BufferOptions};
use super::error::{LoggerError, Result};
use super::last_chance;
use super::log_level::LogLevel;
use super::log_message::LogMessage;
use super::metrics::PipelineMetrics;
use super::persister::Persister;
use std::sync::Arc;

/// The buffer type every logger submits to
pub type MessagePipeline = AsyncBuffer<Arc<LogMessage>>;

/// Buffer handler that feeds pages to a persister, initializing it lazily
pub struct MessageBuffer {
    persister: Box<dyn Persister>,
    initialized: bool,
}

impl MessageBuffer {
    pub fn new(persister: Box<dyn Persister>) -> Self {
        Self {
            persister,
            initialized: false,
        }
    }

    /// Start a pipeline that delivers to `persister`
    pub fn start(
        persister: Box<dyn Persister>,
        options: BufferOptions,
        metrics: Arc<PipelineMetrics>,
    ) -> Result<MessagePipeline> {
        AsyncBuffer::with_metrics(Self::new(persister), options, metrics)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn ensure_initialized(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        match self.persister.initialize() {
            Ok(()) => {
                self.initialized = true;
                Ok(())
            }
            Err(e) => {
                last_chance::log_error(
                    LogLevel::Error,
                    &format!("{}: initialization failed", self.persister.name()),
                    &e,
                );
                Err(LoggerError::persister(
                    self.persister.name(),
                    "not initialized; page dropped",
                ))
            }
        }
    }
}

impl BufferHandler<Arc<LogMessage>> for MessageBuffer {
    fn on_buffer_action(&mut self, page: Vec<Arc<LogMessage>>) -> Result<()> {
        self.ensure_initialized()?;
        self.persister.persist_messages(&page)
    }

    fn on_close(&mut self) -> Result<()> {
        self.persister.close()
    }
}
