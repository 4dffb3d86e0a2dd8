use serde::Serialize;
use std::sync::Mutex;

/// Counters for the status surface.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MetricsSnapshot {
    /// Windows scored by the detector.
    pub processed: u64,
    /// Events appended to the ledger.
    pub events: u64,
    /// Failed ledger appends (degraded service, pipeline kept running).
    pub ledger_errors: u64,
    /// Transient source reads that were retried.
    pub source_retries: u64,
    /// False once every pipeline stage has exited.
    pub running: bool,
}

pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot {
                running: true,
                ..MetricsSnapshot::default()
            }),
        }
    }

    pub fn record_processed(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.processed += 1;
        }
    }

    pub fn record_event(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.events += 1;
        }
    }

    pub fn record_ledger_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.ledger_errors += 1;
        }
    }

    pub fn record_source_retry(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.source_retries += 1;
        }
    }

    pub fn mark_stopped(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.running = false;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().map(|metrics| *metrics).unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
