//! Process-wide ambient metrics. Aside from [`crate::engines::router::EngineRouter`],
//! this is the only state shared across every session rather than owned by one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;

use crate::models::AlertType;

/// Fixed latency buckets in microseconds, upper-bound inclusive; the last
/// bucket catches everything above `BUCKETS_US`'s final boundary.
const BUCKETS_US: [u64; 10] = [500, 1_000, 2_000, 5_000, 10_000, 20_000, 50_000, 100_000, 200_000, 500_000];

#[derive(Debug)]
struct LatencyHistogram {
    counts: Vec<AtomicU64>,
    sum_us: AtomicU64,
    total: AtomicU64,
}

impl LatencyHistogram {
    fn new() -> Self {
        Self {
            counts: BUCKETS_US.iter().map(|_| AtomicU64::new(0)).collect(),
            sum_us: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    fn observe(&self, micros: u64) {
        for (bucket, count) in BUCKETS_US.iter().zip(self.counts.iter()) {
            if micros <= *bucket {
                count.fetch_add(1, Ordering::Relaxed);
                break;
            }
        }
        self.sum_us.fetch_add(micros, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    fn mean_us(&self) -> f64 {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.sum_us.load(Ordering::Relaxed) as f64 / total as f64
    }
}

pub struct MetricsCollector {
    ticks_processed: AtomicU64,
    ticks_rejected: AtomicU64,
    primary_calls: AtomicU64,
    primary_failures: AtomicU64,
    secondary_fallbacks: AtomicU64,
    alerts_by_type: RwLock<HashMap<AlertType, u64>>,
    processing_latency: LatencyHistogram,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub ticks_processed: u64,
    pub ticks_rejected: u64,
    pub primary_calls: u64,
    pub primary_failures: u64,
    pub secondary_fallbacks: u64,
    pub mean_processing_ms: f64,
    pub alerts_by_type: HashMap<String, u64>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            ticks_processed: AtomicU64::new(0),
            ticks_rejected: AtomicU64::new(0),
            primary_calls: AtomicU64::new(0),
            primary_failures: AtomicU64::new(0),
            secondary_fallbacks: AtomicU64::new(0),
            alerts_by_type: RwLock::new(HashMap::new()),
            processing_latency: LatencyHistogram::new(),
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self, engine: &str, processing_ms: f64) {
        self.ticks_processed.fetch_add(1, Ordering::Relaxed);
        self.processing_latency.observe((processing_ms * 1000.0).max(0.0) as u64);
        if engine.starts_with("primary") {
            self.primary_calls.fetch_add(1, Ordering::Relaxed);
        }
        if engine == "secondary_fallback" {
            self.secondary_fallbacks.fetch_add(1, Ordering::Relaxed);
            self.primary_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rejected(&self) {
        self.ticks_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert(&self, alert_type: AlertType) {
        *self.alerts_by_type.write().entry(alert_type).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let alerts_by_type = self
            .alerts_by_type
            .read()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), *v))
            .collect();
        MetricsSnapshot {
            ticks_processed: self.ticks_processed.load(Ordering::Relaxed),
            ticks_rejected: self.ticks_rejected.load(Ordering::Relaxed),
            primary_calls: self.primary_calls.load(Ordering::Relaxed),
            primary_failures: self.primary_failures.load(Ordering::Relaxed),
            secondary_fallbacks: self.secondary_fallbacks.load(Ordering::Relaxed),
            mean_processing_ms: self.processing_latency.mean_us() / 1000.0,
            alerts_by_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_ticks_and_computes_mean_latency() {
        let collector = MetricsCollector::new();
        collector.record_tick("secondary", 1.0);
        collector.record_tick("secondary", 3.0);
        let snap = collector.snapshot();
        assert_eq!(snap.ticks_processed, 2);
        assert!((snap.mean_processing_ms - 2.0).abs() < 0.5);
    }

    #[test]
    fn counts_alerts_by_type() {
        let collector = MetricsCollector::new();
        collector.record_alert(AlertType::Spoofing);
        collector.record_alert(AlertType::Spoofing);
        let snap = collector.snapshot();
        assert_eq!(snap.alerts_by_type.get("SPOOFING"), Some(&2));
    }
}
