//! Memory quota controller
//!
//! Three regimes, by `used`:
//! - below the watermark: nothing happens
//! - between watermark and limit: reclamation is signalled once
//! - at or above the limit: `consume` suspends the writer until a release
//!   brings `used` under the limit, the timeout expires, or the writer is
//!   cancelled
//!
//! The state lock is a plain `std::sync::Mutex` and is never held across an
//! `.await` or while a listener hook runs.

use std::future::pending;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};

use super::cancel::CancelToken;
use super::errors::{QuotaError, QuotaResult, TimeoutReason};
use super::listener::{NoopListener, QuotaListener};
use crate::observability::{log_event_with_fields, Event, Logger, MetricsRegistry, Severity};

#[derive(Debug)]
struct QuotaState {
    limit: usize,
    watermark: usize,
    used: usize,
    /// Set when `on_watermark` fired and `used` has not dropped below the
    /// watermark since
    watermark_signalled: bool,
}

impl QuotaState {
    /// Returns true if the caller must send the watermark signal
    fn arm_watermark(&mut self) -> bool {
        if self.used >= self.watermark && !self.watermark_signalled {
            self.watermark_signalled = true;
            return true;
        }
        false
    }

    fn rearm_if_below_watermark(&mut self) {
        if self.used < self.watermark {
            self.watermark_signalled = false;
        }
    }
}

/// Point-in-time view of the quota
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaInfo {
    pub used: usize,
    pub limit: usize,
    pub watermark: usize,
    /// `used` as a percentage of `limit`, may exceed 100
    pub ratio_percent: u64,
}

/// Engine-wide memory accounting and backpressure
pub struct Quota {
    state: Mutex<QuotaState>,
    released: Notify,
    timeout: Duration,
    listener: Arc<dyn QuotaListener>,
    metrics: Arc<MetricsRegistry>,
}

impl Quota {
    /// Quota with the given hard limit and throttle timeout. The watermark
    /// starts equal to the limit.
    pub fn new(limit: usize, timeout: Duration) -> Self {
        Self::with_listener(limit, timeout, Arc::new(NoopListener))
    }

    pub fn with_listener(
        limit: usize,
        timeout: Duration,
        listener: Arc<dyn QuotaListener>,
    ) -> Self {
        Self {
            state: Mutex::new(QuotaState {
                limit,
                watermark: limit,
                used: 0,
                watermark_signalled: false,
            }),
            released: Notify::new(),
            timeout,
            listener,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    /// Report into a shared metrics registry instead of a private one
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    fn lock(&self) -> MutexGuard<'_, QuotaState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Charge `size` bytes, waiting while `used` is at or above the limit.
    ///
    /// The charge is applied before any check and is kept on timeout. A
    /// zero timeout fails only when the charge leaves `used` at or above
    /// the limit.
    pub async fn consume(&self, size: usize) -> QuotaResult<()> {
        self.consume_inner(size, None).await
    }

    /// Like [`consume`](Self::consume), but gives up as soon as `cancel`
    /// fires.
    pub async fn consume_cancellable(&self, size: usize, cancel: &CancelToken) -> QuotaResult<()> {
        self.consume_inner(size, Some(cancel)).await
    }

    async fn consume_inner(&self, size: usize, cancel: Option<&CancelToken>) -> QuotaResult<()> {
        let deadline = Instant::now() + self.timeout;

        let (used, signal) = {
            let mut state = self.lock();
            state.used = state.used.saturating_add(size);
            let signal = state.arm_watermark();
            (state.used, signal)
        };
        if signal {
            self.signal_watermark(used);
        }

        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let used = {
                let state = self.lock();
                if state.used < state.limit {
                    return Ok(());
                }
                state.used
            };

            if cancel.map_or(false, CancelToken::is_cancelled) {
                return Err(self.timed_out(size, used, TimeoutReason::Cancelled));
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(self.timed_out(size, used, TimeoutReason::Expired));
            }

            let remaining = deadline - now;
            self.metrics.increment_throttle_waits();
            log_event_with_fields(
                Event::QuotaThrottled,
                &[
                    ("remaining_ms", &remaining.as_millis().to_string()),
                    ("size", &size.to_string()),
                    ("used", &used.to_string()),
                ],
            );
            self.listener.on_throttle(remaining);

            tokio::select! {
                _ = &mut notified => {}
                _ = sleep_until(deadline) => {}
                _ = wait_cancelled(cancel) => {}
            }
        }
    }

    /// Charge `size` bytes without throttling and without the watermark
    /// signal.
    pub fn force_consume(&self, size: usize) {
        let mut state = self.lock();
        state.used = state.used.saturating_add(size);
    }

    /// Return `size` bytes.
    ///
    /// Releasing more than is charged is an invariant violation: it panics
    /// in debug builds and clamps `used` at zero after a fatal log line in
    /// release builds.
    pub fn release(&self, size: usize) {
        let (used, below_limit, underflow) = {
            let mut state = self.lock();
            let underflow = size > state.used;
            state.used = state.used.saturating_sub(size);
            state.rearm_if_below_watermark();
            (state.used, state.used < state.limit, underflow)
        };

        if underflow {
            log_event_with_fields(
                Event::QuotaUnderflow,
                &[("size", &size.to_string()), ("used", &used.to_string())],
            );
            if cfg!(debug_assertions) {
                panic!("quota release of {} bytes underflows", size);
            }
        }

        if Logger::enabled(Severity::Trace) {
            log_event_with_fields(
                Event::QuotaReleased,
                &[("size", &size.to_string()), ("used", &used.to_string())],
            );
        }

        if below_limit {
            self.released.notify_waiters();
            self.listener.on_release(used);
        }
    }

    /// Recompute the watermark so that reclaiming `chunk_size` bytes at
    /// `release_rate` finishes before writes at `use_rate` reach the limit:
    /// `watermark = max(0, limit - chunk_size * use_rate / release_rate)`.
    ///
    /// A zero `release_rate` with a non-zero numerator drives the watermark
    /// to zero.
    pub fn update_watermark(&self, chunk_size: usize, use_rate: usize, release_rate: usize) {
        let numerator = chunk_size as u128 * use_rate as u128;
        let gap = match (numerator, release_rate) {
            (0, _) => 0,
            (_, 0) => u128::MAX,
            (n, rate) => n / rate as u128,
        };

        let (watermark, limit) = {
            let mut state = self.lock();
            state.watermark = (state.limit as u128).saturating_sub(gap) as usize;
            state.rearm_if_below_watermark();
            (state.watermark, state.limit)
        };

        log_event_with_fields(
            Event::QuotaWatermarkUpdated,
            &[
                ("chunk_size", &chunk_size.to_string()),
                ("limit", &limit.to_string()),
                ("release_rate", &release_rate.to_string()),
                ("use_rate", &use_rate.to_string()),
                ("watermark", &watermark.to_string()),
            ],
        );
    }

    /// Reclamation should run (`used >= watermark`)
    pub fn is_exceeded(&self) -> bool {
        let state = self.lock();
        state.used >= state.watermark
    }

    /// Writers are being held back (`used >= limit`)
    pub fn is_throttled(&self) -> bool {
        let state = self.lock();
        state.used >= state.limit
    }

    pub fn used(&self) -> usize {
        self.lock().used
    }

    pub fn limit(&self) -> usize {
        self.lock().limit
    }

    pub fn watermark(&self) -> usize {
        self.lock().watermark
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn info(&self) -> QuotaInfo {
        let state = self.lock();
        let ratio_percent = if state.limit == 0 {
            0
        } else {
            (state.used as u128 * 100 / state.limit as u128) as u64
        };
        QuotaInfo {
            used: state.used,
            limit: state.limit,
            watermark: state.watermark,
            ratio_percent,
        }
    }

    fn signal_watermark(&self, used: usize) {
        self.metrics.increment_watermark_signals();
        log_event_with_fields(
            Event::QuotaWatermarkExceeded,
            &[("used", &used.to_string())],
        );
        self.listener.on_watermark(used);
    }

    fn timed_out(&self, size: usize, used: usize, reason: TimeoutReason) -> QuotaError {
        self.metrics.increment_quota_timeouts();
        log_event_with_fields(
            Event::QuotaTimeout,
            &[
                ("reason", reason.as_str()),
                ("size", &size.to_string()),
                ("used", &used.to_string()),
            ],
        );
        QuotaError::Timeout { size, reason }
    }
}

impl std::fmt::Debug for Quota {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Quota")
            .field("info", &self.info())
            .field("timeout", &self.timeout)
            .finish()
    }
}

async fn wait_cancelled(cancel: Option<&CancelToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => pending::<()>().await,
    }
}
