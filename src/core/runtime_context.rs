//! Runtime context snapshot attached to Warning, Error and Critical messages

use super::correlation::CorrelationContext;
use super::process_context::{current_identity, ProcessContext};
use serde::{Deserialize, Serialize};
use std::backtrace::Backtrace;

/// Machine-level facts about where a message was raised
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineContext {
    pub identity: String,
    pub host_name: String,
    pub process_id: u32,
    pub thread: String,
    /// Captured stack, or `None` when stack capture is disabled
    pub stack: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeContext {
    pub machine: MachineContext,
    /// Descriptor of the external request being served, if any
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub request: Option<String>,
}

impl RuntimeContext {
    /// Take a snapshot on the calling thread.
    ///
    /// Capturing the stack is the expensive part; callers only do this for
    /// enabled levels.
    pub fn capture(
        process: &ProcessContext,
        correlation: &CorrelationContext,
        capture_stack: bool,
    ) -> Self {
        let current = std::thread::current();
        let thread = match current.name() {
            Some(name) => name.to_string(),
            None => format!("{:?}", current.id()),
        };
        let stack = capture_stack.then(|| Backtrace::force_capture().to_string());

        Self {
            machine: MachineContext {
                identity: current_identity(),
                host_name: process.host_name.clone(),
                process_id: process.process_id,
                thread,
                stack,
            },
            request: correlation.request().map(str::to_string),
        }
    }
}
