//! In-memory persister
//!
//! Keeps every persisted message in a shared store so the pipeline can be
//! inspected while it runs. Selected pages can be made to fail.

use crate::core::error::{LoggerError, Result};
use crate::core::log_message::LogMessage;
use crate::core::persister::Persister;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct StoreInner {
    messages: Vec<Arc<LogMessage>>,
    page_sizes: Vec<usize>,
    initialized: usize,
    closed: usize,
}

/// Read side of a [`MemoryPersister`]; cheap to clone
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryStore {
    pub fn messages(&self) -> Vec<Arc<LogMessage>> {
        self.inner.lock().messages.clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.inner
            .lock()
            .messages
            .iter()
            .map(|m| m.message_text.clone())
            .collect()
    }

    /// Size of every successfully persisted page, in delivery order
    pub fn page_sizes(&self) -> Vec<usize> {
        self.inner.lock().page_sizes.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn initialize_count(&self) -> usize {
        self.inner.lock().initialized
    }

    pub fn close_count(&self) -> usize {
        self.inner.lock().closed
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.messages.clear();
        inner.page_sizes.clear();
    }
}

pub struct MemoryPersister {
    store: MemoryStore,
    /// 1-based page numbers that fail instead of being stored
    fail_pages: Vec<usize>,
    pages_seen: usize,
}

impl MemoryPersister {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::default(),
            fail_pages: Vec::new(),
            pages_seen: 0,
        }
    }

    /// Fail the listed pages (1-based, counted in delivery order)
    #[must_use]
    pub fn failing_pages(mut self, pages: impl IntoIterator<Item = usize>) -> Self {
        self.fail_pages = pages.into_iter().collect();
        self
    }

    pub fn store(&self) -> MemoryStore {
        self.store.clone()
    }
}

impl Default for MemoryPersister {
    fn default() -> Self {
        Self::new()
    }
}

impl Persister for MemoryPersister {
    fn name(&self) -> &str {
        "memory"
    }

    fn initialize(&mut self) -> Result<()> {
        self.store.inner.lock().initialized += 1;
        Ok(())
    }

    fn persist_messages(&mut self, page: &[Arc<LogMessage>]) -> Result<()> {
        self.pages_seen += 1;
        if self.fail_pages.contains(&self.pages_seen) {
            return Err(LoggerError::persister(
                self.name(),
                format!("page {} rejected", self.pages_seen),
            ));
        }
        let mut inner = self.store.inner.lock();
        inner.messages.extend(page.iter().cloned());
        inner.page_sizes.push(page.len());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.store.inner.lock().closed += 1;
        Ok(())
    }
}
