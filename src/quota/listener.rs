//! Hooks the quota calls into its memory-pressure monitor

use std::time::Duration;

/// Receiver of quota state transitions.
///
/// Hooks run synchronously on the task that caused the transition and must
/// not block. None of them is called with the quota lock held, so a hook may
/// read `Quota::info`.
pub trait QuotaListener: Send + Sync {
    /// `used` reached the watermark. Called once per crossing; the signal is
    /// re-armed when `used` drops below the watermark again.
    fn on_watermark(&self, _used: usize) {}

    /// A writer is about to wait at the hard limit with `remaining` time
    /// left.
    fn on_throttle(&self, _remaining: Duration) {}

    /// `used` is below the limit after a release.
    fn on_release(&self, _used: usize) {}
}

/// Listener that ignores every transition
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl QuotaListener for NoopListener {}
