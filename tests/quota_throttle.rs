//! Quota Throttle Tests
//!
//! Memory accounting and writer backpressure:
//! - The watermark signal fires once per crossing
//! - Writers at the limit wait for a release, a timeout or a cancel
//! - A timed out `consume` keeps its charge; a timed out write does not
//! - Balanced charges end at zero

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tuplebox::config::StorageConfig;
use tuplebox::format::{FieldType, FormatDef, KeyDef};
use tuplebox::quota::{CancelToken, QuotaError, QuotaListener, TimeoutReason};
use tuplebox::tuple::TupleErrorCode;
use tuplebox::{Quota, StorageContext};

// =============================================================================
// Helper Functions
// =============================================================================

#[derive(Default)]
struct CountingListener {
    watermark: AtomicUsize,
    throttle: AtomicUsize,
    release: AtomicUsize,
}

impl QuotaListener for CountingListener {
    fn on_watermark(&self, _used: usize) {
        self.watermark.fetch_add(1, Ordering::SeqCst);
    }

    fn on_throttle(&self, _remaining: Duration) {
        self.throttle.fetch_add(1, Ordering::SeqCst);
    }

    fn on_release(&self, _used: usize) {
        self.release.fetch_add(1, Ordering::SeqCst);
    }
}

fn quota_with_listener(limit: usize, timeout: Duration) -> (Arc<Quota>, Arc<CountingListener>) {
    let listener = Arc::new(CountingListener::default());
    let quota = Quota::with_listener(limit, timeout, Arc::clone(&listener) as Arc<dyn QuotaListener>);
    (Arc::new(quota), listener)
}

fn small_context(limit: usize, timeout_ms: u64) -> StorageContext {
    StorageContext::new(&StorageConfig {
        memory_limit_bytes: limit,
        quota_timeout_ms: timeout_ms,
        ..StorageConfig::default()
    })
}

fn primary_key() -> FormatDef {
    FormatDef::engine(vec![KeyDef::from_fields(&[(0, FieldType::Unsigned)])])
}

// =============================================================================
// Throttling Scenario Tests
// =============================================================================

/// A writer blocked at the limit resumes once a release brings usage below it.
#[tokio::test]
async fn test_blocked_writer_resumes_after_release() {
    let (quota, listener) = quota_with_listener(100, Duration::from_secs(5));
    quota.update_watermark(20, 1, 1);
    assert_eq!(quota.watermark(), 80);

    quota.consume(90).await.unwrap();
    assert!(quota.is_exceeded());
    assert!(!quota.is_throttled());
    assert_eq!(listener.watermark.load(Ordering::SeqCst), 1);

    let releaser = {
        let quota = Arc::clone(&quota);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            quota.release(30);
        })
    };

    quota.consume(20).await.unwrap();
    releaser.await.unwrap();

    assert_eq!(quota.used(), 80);
    assert!(listener.throttle.load(Ordering::SeqCst) >= 1);
    assert_eq!(listener.release.load(Ordering::SeqCst), 1);
    assert_eq!(listener.watermark.load(Ordering::SeqCst), 1);

    quota.release(80);
    assert_eq!(quota.used(), 0);
}

/// The watermark signal fires again only after usage drops below it.
#[tokio::test]
async fn test_watermark_rearmed_below_watermark() {
    let (quota, listener) = quota_with_listener(100, Duration::from_secs(1));
    quota.update_watermark(50, 1, 1);

    quota.consume(60).await.unwrap();
    quota.consume(10).await.unwrap();
    assert_eq!(listener.watermark.load(Ordering::SeqCst), 1);

    quota.release(15);
    quota.consume(5).await.unwrap();
    assert_eq!(listener.watermark.load(Ordering::SeqCst), 1);

    quota.release(30);
    quota.consume(40).await.unwrap();
    assert_eq!(listener.watermark.load(Ordering::SeqCst), 2);
}

/// A timed out consume reports the size and keeps the charge.
#[tokio::test]
async fn test_timeout_keeps_charge() {
    let (quota, _listener) = quota_with_listener(100, Duration::from_millis(20));
    quota.force_consume(100);

    let err = quota.consume(10).await.unwrap_err();
    assert!(matches!(
        err,
        QuotaError::Timeout {
            size: 10,
            reason: TimeoutReason::Expired
        }
    ));
    assert_eq!(quota.used(), 110);
}

/// Many concurrent writers with matching releases leave the quota empty.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_balanced_use() {
    let (quota, _listener) = quota_with_listener(1000, Duration::from_secs(5));

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let quota = Arc::clone(&quota);
            tokio::spawn(async move {
                for _ in 0..50 {
                    let size = 10 + i;
                    quota.consume(size).await.unwrap();
                    tokio::task::yield_now().await;
                    quota.release(size);
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(quota.used(), 0);
}

// =============================================================================
// Write Path Tests
// =============================================================================

/// A write that times out is rolled back and can be retried.
#[tokio::test]
async fn test_write_timeout_rolls_back() {
    let ctx = small_context(64, 20);
    let pin = ctx.pin_format(&primary_key()).unwrap();
    let filler = ctx
        .new_replace(pin.id(), &rmp_serde::to_vec(&(1u32, "x".repeat(80))).unwrap())
        .unwrap();
    let used = ctx.quota().used();
    assert!(ctx.quota().is_throttled());

    let data = rmp_serde::to_vec(&(2u32, "y")).unwrap();
    let err = ctx.write_statement(pin.id(), &data, None).await.unwrap_err();
    assert_eq!(err.code(), TupleErrorCode::TupleQuotaTimeout);
    assert!(err.is_retryable());
    assert_eq!(ctx.quota().used(), used);

    drop(filler);
    let stmt = ctx.write_statement(pin.id(), &data, None).await.unwrap();
    assert_eq!(ctx.quota().used(), stmt.bsize());
}

/// A write blocked at the limit completes when memory is freed.
#[tokio::test]
async fn test_write_waits_for_release() {
    let ctx = small_context(64, 5_000);
    let pin = ctx.pin_format(&primary_key()).unwrap();
    let filler = ctx
        .new_replace(pin.id(), &rmp_serde::to_vec(&(1u32, "x".repeat(80))).unwrap())
        .unwrap();

    let dropper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        drop(filler);
    });

    let data = rmp_serde::to_vec(&(2u32, "y")).unwrap();
    let stmt = ctx.write_statement(pin.id(), &data, None).await.unwrap();
    dropper.await.unwrap();

    assert_eq!(stmt.data(), data.as_slice());
    assert_eq!(ctx.quota().used(), stmt.bsize());
}

/// Cancelling a blocked write returns a retryable error and no charge.
#[tokio::test]
async fn test_write_cancelled() {
    let ctx = small_context(64, 5_000);
    let pin = ctx.pin_format(&primary_key()).unwrap();
    let _filler = ctx
        .new_replace(pin.id(), &rmp_serde::to_vec(&(1u32, "x".repeat(80))).unwrap())
        .unwrap();
    let used = ctx.quota().used();

    let token = CancelToken::new();
    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        })
    };

    let data = rmp_serde::to_vec(&(2u32, "y")).unwrap();
    let err = ctx
        .write_statement(pin.id(), &data, Some(&token))
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert_eq!(err.code(), TupleErrorCode::TupleQuotaTimeout);
    assert!(err.message().contains("cancelled"));
    assert_eq!(ctx.quota().used(), used);
}
