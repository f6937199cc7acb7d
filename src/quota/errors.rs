//! Quota error types

use std::fmt;

use thiserror::Error;

/// Why a throttled writer stopped waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutReason {
    /// The configured timeout elapsed
    Expired,
    /// The caller's cancel token fired
    Cancelled,
}

impl TimeoutReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeoutReason::Expired => "expired",
            TimeoutReason::Cancelled => "was cancelled",
        }
    }
}

impl fmt::Display for TimeoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Quota failures. The only recoverable one is a timeout; underflow is a
/// fatal invariant violation and is not represented here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuotaError {
    /// The charge of `size` bytes stays applied; releasing it is up to the
    /// caller.
    #[error("quota wait for {size} bytes {reason}")]
    Timeout { size: usize, reason: TimeoutReason },
}

impl QuotaError {
    pub fn reason(&self) -> TimeoutReason {
        match self {
            QuotaError::Timeout { reason, .. } => *reason,
        }
    }

    /// Bytes that were charged by the failed call
    pub fn size(&self) -> usize {
        match self {
            QuotaError::Timeout { size, .. } => *size,
        }
    }
}

pub type QuotaResult<T> = Result<T, QuotaError>;
