//! Explicit correlation context
//!
//! Carries the activity id that links messages of one logical operation,
//! an optional descriptor of the external request being served, and the
//! open trace operations. A context is passed to loggers with
//! [`Logger::with_correlation`](crate::Logger::with_correlation) instead of
//! living in thread-local state.
//!
//! One context is shared by every clone of a logger, so open operations are
//! kept as one stack per thread. A probe's parent is the innermost operation
//! opened on its own thread.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use uuid::Uuid;

pub struct CorrelationContext {
    activity_id: Uuid,
    request: Option<String>,
    operations: Mutex<HashMap<ThreadId, Vec<Uuid>>>,
}

impl CorrelationContext {
    /// New context with a freshly generated activity id
    pub fn new() -> Self {
        Self::with_activity(Uuid::new_v4())
    }

    /// Continue an activity started elsewhere. A nil id is replaced with a
    /// fresh one.
    pub fn with_activity(activity_id: Uuid) -> Self {
        let activity_id = if activity_id.is_nil() {
            Uuid::new_v4()
        } else {
            activity_id
        };
        Self {
            activity_id,
            request: None,
            operations: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a descriptor of the external request (HTTP request line,
    /// RPC method, job id) included in runtime context snapshots.
    #[must_use]
    pub fn with_request(mut self, descriptor: impl Into<String>) -> Self {
        self.request = Some(descriptor.into());
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn activity_id(&self) -> Uuid {
        self.activity_id
    }

    pub fn request(&self) -> Option<&str> {
        self.request.as_deref()
    }

    /// Innermost operation open on the calling thread, if any
    pub fn current_operation(&self) -> Option<Uuid> {
        self.operations
            .lock()
            .get(&thread::current().id())
            .and_then(|stack| stack.last().copied())
    }

    /// Open operations on the calling thread
    pub fn depth(&self) -> usize {
        self.operations
            .lock()
            .get(&thread::current().id())
            .map_or(0, Vec::len)
    }

    /// Open operations across all threads
    pub fn total_depth(&self) -> usize {
        self.operations.lock().values().map(Vec::len).sum()
    }

    /// Push `id` on the calling thread's stack and return the previous top
    /// (the parent operation)
    pub(crate) fn push_operation(&self, id: Uuid) -> Option<Uuid> {
        let mut ops = self.operations.lock();
        let stack = ops.entry(thread::current().id()).or_default();
        let parent = stack.last().copied();
        stack.push(id);
        parent
    }

    /// Remove `id` from the stack of the thread that pushed it.
    ///
    /// Normally `id` is the top. If inner operations on that thread were
    /// leaked (for example a probe moved into a longer-lived value) they are
    /// removed too. Other threads' stacks are never touched.
    pub(crate) fn pop_operation(&self, owner: ThreadId, id: Uuid) {
        let mut ops = self.operations.lock();
        if let Some(stack) = ops.get_mut(&owner) {
            if let Some(pos) = stack.iter().rposition(|op| *op == id) {
                stack.truncate(pos);
            }
            if stack.is_empty() {
                ops.remove(&owner);
            }
        }
    }
}

impl Default for CorrelationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CorrelationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationContext")
            .field("activity_id", &self.activity_id)
            .field("request", &self.request)
            .field("open_operations", &self.total_depth())
            .finish()
    }
}
