//! Asynchronous page buffer
//!
//! A generic batching primitive: any number of producers [`submit`] items,
//! one worker thread extracts them in pages and hands each page to a
//! [`BufferHandler`]. The worker wakes when a full page is pending, on a
//! fixed tick, on an explicit [`flush`], and once more when the buffer is
//! closed to drain whatever is left.
//!
//! Guarantees:
//! - items inside a page keep submission order, and page N is delivered
//!   before page N+1 is extracted
//! - no item is delivered twice; a page whose handler fails is dropped
//! - everything submitted before [`close`] is delivered before it returns
//!
//! [`submit`]: AsyncBuffer::submit
//! [`flush`]: AsyncBuffer::flush
//! [`close`]: AsyncBuffer::close

use super::error::{LoggerError, Result};
use super::last_chance;
use super::log_level::LogLevel;
use super::metrics::PipelineMetrics;
use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long `Drop` waits for the worker to drain
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Receives pages on the worker thread
pub trait BufferHandler<T>: Send + 'static {
    /// Deliver one page, oldest item first
    fn on_buffer_action(&mut self, page: Vec<T>) -> Result<()>;

    /// Called once, after the final page
    fn on_close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Running,
    Closing,
    Closed,
}

impl BufferState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => BufferState::Running,
            1 => BufferState::Closing,
            _ => BufferState::Closed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BufferOptions {
    /// Largest page handed to the handler; a full page wakes the worker
    pub page_size: usize,
    /// Worker tick; partial pages wait at most this long
    pub flush_interval: Duration,
    /// Bound on pending items, unbounded when `None`
    pub capacity: Option<usize>,
    pub thread_name: String,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            page_size: 100,
            flush_interval: Duration::from_millis(500),
            capacity: None,
            thread_name: "paged-log-worker".to_string(),
        }
    }
}

enum Control {
    Flush(Sender<()>),
    Close,
}

struct Shared<T> {
    pending: Mutex<Vec<T>>,
    /// Written only while `pending` is locked
    state: AtomicU8,
    page_size: usize,
    capacity: Option<usize>,
    metrics: Arc<PipelineMetrics>,
}

impl<T> Shared<T> {
    fn state(&self) -> BufferState {
        BufferState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: BufferState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

pub struct AsyncBuffer<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    doorbell: Sender<()>,
    control: Sender<Control>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> AsyncBuffer<T> {
    /// Start a buffer and its worker thread
    pub fn new<H>(handler: H, options: BufferOptions) -> Result<Self>
    where
        H: BufferHandler<T>,
    {
        Self::with_metrics(handler, options, Arc::new(PipelineMetrics::new()))
    }

    pub fn with_metrics<H>(
        handler: H,
        options: BufferOptions,
        metrics: Arc<PipelineMetrics>,
    ) -> Result<Self>
    where
        H: BufferHandler<T>,
    {
        if options.page_size == 0 {
            return Err(LoggerError::config("page_size", "page size must be at least 1"));
        }
        if options.flush_interval.is_zero() {
            return Err(LoggerError::config(
                "flush_interval",
                "flush interval must be greater than zero",
            ));
        }

        let shared = Arc::new(Shared {
            pending: Mutex::new(Vec::with_capacity(options.page_size)),
            state: AtomicU8::new(BufferState::Running as u8),
            page_size: options.page_size,
            capacity: options.capacity,
            metrics,
        });

        // A single pending wake is enough; extra rings are coalesced.
        let (doorbell, doorbell_rx) = bounded(1);
        let (control, control_rx) = unbounded();

        let worker = Worker {
            shared: Arc::clone(&shared),
            handler,
            name: options.thread_name.clone(),
        };
        let interval = options.flush_interval;
        let handle = thread::Builder::new()
            .name(options.thread_name)
            .spawn(move || worker.run(doorbell_rx, control_rx, interval))
            .map_err(|e| LoggerError::io_operation("spawning buffer worker", "spawn failed", e))?;

        Ok(Self {
            shared,
            doorbell,
            control,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Queue one item. Never blocks on delivery.
    ///
    /// Fails with [`LoggerError::BufferClosed`] once closing has begun and
    /// with [`LoggerError::QueueFull`] when a capacity is set and reached.
    pub fn submit(&self, item: T) -> Result<()> {
        let shared = &*self.shared;
        let len = {
            let mut pending = shared.pending.lock();
            if shared.state() != BufferState::Running {
                drop(pending);
                shared.metrics.record_rejected();
                return Err(LoggerError::BufferClosed);
            }
            if let Some(max) = shared.capacity {
                if pending.len() >= max {
                    let current = pending.len();
                    drop(pending);
                    shared.metrics.record_rejected();
                    return Err(LoggerError::queue_full(current, max));
                }
            }
            pending.push(item);
            pending.len()
        };
        shared.metrics.record_submitted();

        if len >= shared.page_size {
            // Full means a wake is already queued
            let _ = self.doorbell.try_send(());
        }
        Ok(())
    }

    /// Deliver everything pending now and wait until the handler is done
    pub fn flush(&self) -> Result<()> {
        if self.shared.state() != BufferState::Running {
            return Err(LoggerError::BufferClosed);
        }
        let (ack, done) = bounded(1);
        self.control
            .send(Control::Flush(ack))
            .map_err(|_| LoggerError::BufferClosed)?;
        // The worker acknowledges, or drops the request while shutting down.
        done.recv().map_err(|_| LoggerError::BufferClosed)
    }

    /// Stop accepting items, drain, run `on_close`, and join the worker.
    ///
    /// Blocks until the drain is complete. Calling it again is a no-op.
    pub fn close(&self) {
        self.begin_close();
        let mut worker = self.worker.lock();
        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                last_chance::log(LogLevel::Critical, "Buffer worker thread panicked during close");
            }
        }
    }

    /// Like [`close`](Self::close) but gives up after `timeout`.
    ///
    /// Returns `false` if the worker had not finished; it keeps draining in
    /// the background.
    pub fn close_timeout(&self, timeout: Duration) -> bool {
        self.begin_close();
        let start = Instant::now();

        let Some(mut worker) = self.worker.try_lock_for(timeout) else {
            return false;
        };
        let Some(handle) = worker.take() else {
            return true;
        };

        loop {
            if handle.is_finished() {
                if handle.join().is_err() {
                    last_chance::log(
                        LogLevel::Critical,
                        "Buffer worker thread panicked during close",
                    );
                    return false;
                }
                return true;
            }
            if start.elapsed() >= timeout {
                *worker = Some(handle);
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn state(&self) -> BufferState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == BufferState::Running
    }

    /// Items submitted but not yet extracted by the worker
    pub fn pending_len(&self) -> usize {
        self.shared.pending.lock().len()
    }

    pub fn page_size(&self) -> usize {
        self.shared.page_size
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.shared.metrics
    }

    fn begin_close(&self) {
        let pending = self.shared.pending.lock();
        if self.shared.state() != BufferState::Running {
            return;
        }
        self.shared.set_state(BufferState::Closing);
        drop(pending);
        // Fails only when the worker is already gone; join handles that
        let _ = self.control.send(Control::Close);
    }
}

impl<T: Send + 'static> Drop for AsyncBuffer<T> {
    fn drop(&mut self) {
        if !self.close_timeout(DEFAULT_CLOSE_TIMEOUT) {
            last_chance::log(
                LogLevel::Warning,
                &format!(
                    "Buffer worker did not finish within {:?}; {} item(s) may be lost",
                    DEFAULT_CLOSE_TIMEOUT,
                    self.shared.metrics.in_flight()
                ),
            );
        }
    }
}

struct Worker<T, H> {
    shared: Arc<Shared<T>>,
    handler: H,
    name: String,
}

impl<T: Send + 'static, H: BufferHandler<T>> Worker<T, H> {
    fn run(mut self, doorbell: Receiver<()>, control: Receiver<Control>, interval: Duration) {
        let ticker = tick(interval);

        loop {
            select! {
                recv(doorbell) -> _ => self.deliver_full_pages(),
                recv(ticker) -> _ => self.deliver_all(),
                recv(control) -> msg => match msg {
                    Ok(Control::Flush(ack)) => {
                        self.deliver_all();
                        let _ = ack.send(());
                    }
                    Ok(Control::Close) | Err(_) => break,
                },
            }
        }

        // The state is already Closing, so nothing new can land after this.
        self.deliver_all();
        match catch_unwind(AssertUnwindSafe(|| self.handler.on_close())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => last_chance::log_error(
                LogLevel::Error,
                &format!("{}: close handler failed", self.name),
                &e,
            ),
            Err(payload) => last_chance::log(
                LogLevel::Critical,
                &LoggerError::panicked(format!("{} close handler", self.name), &*payload)
                    .to_string(),
            ),
        }
        self.shared.set_state(BufferState::Closed);

        while let Ok(msg) = control.try_recv() {
            if let Control::Flush(ack) = msg {
                let _ = ack.send(());
            }
        }
    }

    /// Deliver every full page pending, oldest first.
    ///
    /// The whole backlog is swapped out in one lock hold; only the partial
    /// tail (fewer than `page_size` items) is copied back, so the lock is
    /// held for at most one page's worth of work.
    fn deliver_full_pages(&mut self) {
        let page_size = self.shared.page_size;
        loop {
            let full = {
                let mut pending = self.shared.pending.lock();
                if pending.len() < page_size {
                    break;
                }
                let mut taken = std::mem::take(&mut *pending);
                let tail = taken.len() % page_size;
                if tail > 0 {
                    *pending = taken.split_off(taken.len() - tail);
                }
                taken
            };
            self.deliver_chunks(full);
        }
    }

    /// Swap out everything pending and deliver it in page-size chunks
    fn deliver_all(&mut self) {
        let all = std::mem::take(&mut *self.shared.pending.lock());
        self.deliver_chunks(all);
    }

    fn deliver_chunks(&mut self, items: Vec<T>) {
        let page_size = self.shared.page_size;
        let mut items = items.into_iter();
        loop {
            let page: Vec<T> = items.by_ref().take(page_size).collect();
            if page.is_empty() {
                break;
            }
            self.deliver(page);
        }
    }

    fn deliver(&mut self, page: Vec<T>) {
        let len = page.len();
        let result = catch_unwind(AssertUnwindSafe(|| self.handler.on_buffer_action(page)));
        let metrics = &self.shared.metrics;

        match result {
            Ok(Ok(())) => metrics.record_page(len),
            Ok(Err(e)) => {
                let occurrence = metrics.failed_pages();
                metrics.record_failed_page(len);
                last_chance::log_rate_limited(
                    LogLevel::Error,
                    occurrence,
                    &format!("{}: dropped a page of {} item(s): {}", self.name, len, e),
                );
            }
            Err(payload) => {
                metrics.record_failed_page(len);
                let err = LoggerError::panicked(format!("{} page handler", self.name), &*payload);
                last_chance::log(
                    LogLevel::Critical,
                    &format!("{}; dropped a page of {} item(s)", err, len),
                );
            }
        }
    }
}
