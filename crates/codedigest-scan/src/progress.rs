//! Debounced progress emission.

use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use codedigest_core::ProgressEvent;

/// Default flush interval for progress events.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// Debouncing wrapper around a broadcast sender.
///
/// A pending event is overwritten by the latest state and flushed at most
/// once per interval, never once per file, so observer overhead stays
/// bounded on large trees. Send failures (no subscribers) are ignored.
#[derive(Debug)]
pub struct ProgressEmitter {
    tx: broadcast::Sender<ProgressEvent>,
    pending: Option<ProgressEvent>,
    last_flush: Instant,
    interval: Duration,
}

impl ProgressEmitter {
    /// Create an emitter over an existing broadcast sender.
    pub fn new(tx: broadcast::Sender<ProgressEvent>) -> Self {
        Self::with_interval(tx, PROGRESS_INTERVAL)
    }

    /// Create an emitter with a custom flush interval.
    pub fn with_interval(tx: broadcast::Sender<ProgressEvent>, interval: Duration) -> Self {
        Self {
            tx,
            pending: None,
            last_flush: Instant::now(),
            interval,
        }
    }

    /// Record the latest state; flushes when the interval has elapsed.
    pub fn emit(&mut self, event: ProgressEvent) {
        self.pending = Some(event);
        if self.last_flush.elapsed() >= self.interval {
            self.flush();
        }
    }

    /// Flush the pending event immediately, if any.
    pub fn flush(&mut self) {
        if let Some(event) = self.pending.take() {
            let _ = self.tx.send(event);
            self.last_flush = Instant::now();
        }
    }
}
