use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::wake::WakeContext;

pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

/// Counters accumulated over the lifetime of a manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub runs: u64,
    pub bytes_ingested: u64,
    pub interrupt_wakes: u64,
    pub task_wakes: u64,
    pub compactions: u64,
    pub overflow_resets: u64,
    pub anomalies: u64,
    pub producer_errors: u64,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_run(&self, ingested: usize) {
        self.update(|m| {
            m.runs += 1;
            m.bytes_ingested += ingested as u64;
        });
    }

    pub fn record_wakes(&self, context: WakeContext, count: usize) {
        self.update(|m| match context {
            WakeContext::Interrupt => m.interrupt_wakes += count as u64,
            WakeContext::Task => m.task_wakes += count as u64,
        });
    }

    pub fn record_compaction(&self) {
        self.update(|m| m.compactions += 1);
    }

    pub fn record_overflow_reset(&self) {
        self.update(|m| m.overflow_resets += 1);
    }

    pub fn record_anomaly(&self) {
        self.update(|m| m.anomalies += 1);
    }

    pub fn record_producer_error(&self) {
        self.update(|m| m.producer_errors += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            metrics.clone()
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
