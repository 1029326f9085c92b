//! Pipeline metrics
//!
//! Counters shared between producers and the buffer worker. All counters
//! use relaxed atomics; they are for observation, not synchronization.

use std::sync::atomic::{AtomicU64, Ordering};

/// # Example
///
/// ```
/// use rust_paged_logger::PipelineMetrics;
///
/// let metrics = PipelineMetrics::new();
/// metrics.record_submitted();
/// metrics.record_page(1);
///
/// assert_eq!(metrics.submitted(), 1);
/// assert_eq!(metrics.delivered(), 1);
/// ```
#[derive(Debug)]
pub struct PipelineMetrics {
    /// Items accepted by the buffer
    submitted: AtomicU64,

    /// Items refused because the buffer was closing or full
    rejected: AtomicU64,

    /// Items handed to the handler in pages that succeeded
    delivered: AtomicU64,

    /// Pages that succeeded
    pages: AtomicU64,

    /// Pages whose handler returned an error or panicked
    failed_pages: AtomicU64,

    /// Items inside failed pages
    lost: AtomicU64,
}

impl PipelineMetrics {
    pub const fn new() -> Self {
        Self {
            submitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            pages: AtomicU64::new(0),
            failed_pages: AtomicU64::new(0),
            lost: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn pages(&self) -> u64 {
        self.pages.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn failed_pages(&self) -> u64 {
        self.failed_pages.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn lost(&self) -> u64 {
        self.lost.load(Ordering::Relaxed)
    }

    /// Returns the previous value
    #[inline]
    pub fn record_submitted(&self) -> u64 {
        self.submitted.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the previous value
    #[inline]
    pub fn record_rejected(&self) -> u64 {
        self.rejected.fetch_add(1, Ordering::Relaxed)
    }

    /// A page of `len` items was delivered
    pub fn record_page(&self, len: usize) {
        self.pages.fetch_add(1, Ordering::Relaxed);
        self.delivered.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// A page of `len` items was dropped after a handler failure
    pub fn record_failed_page(&self, len: usize) {
        self.failed_pages.fetch_add(1, Ordering::Relaxed);
        self.lost.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Items accepted but not yet resolved either way
    pub fn in_flight(&self) -> u64 {
        self.submitted()
            .saturating_sub(self.delivered())
            .saturating_sub(self.lost())
    }

    /// Share of resolved items that were lost, as a percentage (0.0 - 100.0)
    pub fn loss_rate(&self) -> f64 {
        let lost = self.lost() as f64;
        let total = self.delivered() as f64 + lost;
        if total == 0.0 {
            0.0
        } else {
            (lost / total) * 100.0
        }
    }

    pub fn reset(&self) {
        self.submitted.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
        self.delivered.store(0, Ordering::Relaxed);
        self.pages.store(0, Ordering::Relaxed);
        self.failed_pages.store(0, Ordering::Relaxed);
        self.lost.store(0, Ordering::Relaxed);
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PipelineMetrics {
    /// Snapshot of the current values
    fn clone(&self) -> Self {
        Self {
            submitted: AtomicU64::new(self.submitted()),
            rejected: AtomicU64::new(self.rejected()),
            delivered: AtomicU64::new(self.delivered()),
            pages: AtomicU64::new(self.pages()),
            failed_pages: AtomicU64::new(self.failed_pages()),
            lost: AtomicU64::new(self.lost()),
        }
    }
}
