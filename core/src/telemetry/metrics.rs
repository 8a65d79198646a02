use serde::Serialize;
use std::sync::Mutex;

/// Running counters for ingestion decisions and sink health.
pub struct MetricsRecorder {
    inner: Mutex<IngestMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestMetrics {
    pub accepted: usize,
    pub suppressed: usize,
    pub rejected: usize,
    pub alerts: usize,
    pub sink_failures: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(IngestMetrics::default()),
        }
    }

    pub fn record_accepted(&self) {
        self.update(|metrics| metrics.accepted += 1);
    }

    pub fn record_suppressed(&self) {
        self.update(|metrics| metrics.suppressed += 1);
    }

    pub fn record_rejected(&self) {
        self.update(|metrics| metrics.rejected += 1);
    }

    pub fn record_alert(&self) {
        self.update(|metrics| metrics.alerts += 1);
    }

    pub fn record_sink_failure(&self) {
        self.update(|metrics| metrics.sink_failures += 1);
    }

    pub fn reset(&self) {
        self.update(|metrics| *metrics = IngestMetrics::default());
    }

    pub fn snapshot(&self) -> IngestMetrics {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            IngestMetrics::default()
        }
    }

    fn update(&self, apply: impl FnOnce(&mut IngestMetrics)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
