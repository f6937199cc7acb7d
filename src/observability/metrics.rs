//! Metrics registry for tuplebox
//!
//! - Counters plus two gauges (live tuples, live iterators)
//! - Relaxed atomics: values are exact once activity stops, eventually
//!   consistent while it runs

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters of one storage context
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Tuples and statements constructed
    tuples_created: AtomicU64,
    /// Tuples and statements destroyed
    tuples_destroyed: AtomicU64,
    /// Payload bytes of constructed tuples
    tuple_bytes_allocated: AtomicU64,
    /// Keys extracted (tuple and raw)
    key_extractions: AtomicU64,
    /// Iterators handed out
    iterators_opened: AtomicU64,
    /// Iterators returned to the pool
    iterators_closed: AtomicU64,
    /// Iterator requests refused because the pool was full
    iterator_pool_exhausted: AtomicU64,
    /// Watermark signals sent to reclamation
    watermark_signals: AtomicU64,
    /// Suspensions at the hard limit
    throttle_waits: AtomicU64,
    /// Writers that gave up waiting
    quota_timeouts: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    // Tuple metrics

    /// Record a tuple construction of `bsize` payload bytes
    pub fn record_tuple_created(&self, bsize: usize) {
        self.tuples_created.fetch_add(1, Ordering::Relaxed);
        self.tuple_bytes_allocated
            .fetch_add(bsize as u64, Ordering::Relaxed);
    }

    /// Record a tuple destruction
    pub fn record_tuple_destroyed(&self) {
        self.tuples_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    /// Tuples currently alive
    pub fn live_tuples(&self) -> u64 {
        self.tuples_created
            .load(Ordering::Relaxed)
            .saturating_sub(self.tuples_destroyed.load(Ordering::Relaxed))
    }

    /// Increment key extractions
    pub fn increment_key_extractions(&self) {
        self.key_extractions.fetch_add(1, Ordering::Relaxed);
    }

    // Iterator metrics

    pub fn increment_iterators_opened(&self) {
        self.iterators_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_iterators_closed(&self) {
        self.iterators_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_iterator_pool_exhausted(&self) {
        self.iterator_pool_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    // Quota metrics

    pub fn increment_watermark_signals(&self) {
        self.watermark_signals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_throttle_waits(&self) {
        self.throttle_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_quota_timeouts(&self) {
        self.quota_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of all metrics as JSON
    pub fn to_json(&self) -> String {
        let s = self.snapshot();
        format!(
            r#"{{"tuples_created":{},"tuples_destroyed":{},"tuple_bytes_allocated":{},"key_extractions":{},"iterators_opened":{},"iterators_closed":{},"iterator_pool_exhausted":{},"watermark_signals":{},"throttle_waits":{},"quota_timeouts":{}}}"#,
            s.tuples_created,
            s.tuples_destroyed,
            s.tuple_bytes_allocated,
            s.key_extractions,
            s.iterators_opened,
            s.iterators_closed,
            s.iterator_pool_exhausted,
            s.watermark_signals,
            s.throttle_waits,
            s.quota_timeouts,
        )
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tuples_created: self.tuples_created.load(Ordering::Relaxed),
            tuples_destroyed: self.tuples_destroyed.load(Ordering::Relaxed),
            tuple_bytes_allocated: self.tuple_bytes_allocated.load(Ordering::Relaxed),
            key_extractions: self.key_extractions.load(Ordering::Relaxed),
            iterators_opened: self.iterators_opened.load(Ordering::Relaxed),
            iterators_closed: self.iterators_closed.load(Ordering::Relaxed),
            iterator_pool_exhausted: self.iterator_pool_exhausted.load(Ordering::Relaxed),
            watermark_signals: self.watermark_signals.load(Ordering::Relaxed),
            throttle_waits: self.throttle_waits.load(Ordering::Relaxed),
            quota_timeouts: self.quota_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub tuples_created: u64,
    pub tuples_destroyed: u64,
    pub tuple_bytes_allocated: u64,
    pub key_extractions: u64,
    pub iterators_opened: u64,
    pub iterators_closed: u64,
    pub iterator_pool_exhausted: u64,
    pub watermark_signals: u64,
    pub throttle_waits: u64,
    pub quota_timeouts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_zero_values() {
        let snapshot = MetricsRegistry::new().snapshot();
        assert_eq!(snapshot.tuples_created, 0);
        assert_eq!(snapshot.throttle_waits, 0);
        assert_eq!(snapshot.quota_timeouts, 0);
    }

    #[test]
    fn test_live_tuples() {
        let registry = MetricsRegistry::new();
        registry.record_tuple_created(10);
        registry.record_tuple_created(5);
        registry.record_tuple_destroyed();

        assert_eq!(registry.live_tuples(), 1);
        assert_eq!(registry.snapshot().tuple_bytes_allocated, 15);
    }

    #[test]
    fn test_to_json() {
        let registry = MetricsRegistry::new();
        registry.record_tuple_created(1234);
        registry.increment_quota_timeouts();

        let parsed: serde_json::Value = serde_json::from_str(&registry.to_json()).unwrap();
        assert_eq!(parsed["tuple_bytes_allocated"], 1234);
        assert_eq!(parsed["quota_timeouts"], 1);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..100 {
                        reg.increment_key_extractions();
                        reg.increment_throttle_waits();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.key_extractions, 800);
        assert_eq!(snapshot.throttle_waits, 800);
    }
}
