//! Crate-wide error types
//!
//! Each subsystem owns its error type (`codec`, `format`, `tuple`, `quota`,
//! `config`). `BoxError` wraps them for callers at the transaction boundary
//! and classifies them with `ErrorKind`, so that "overloaded, retry" can be
//! told apart from "bad input".

use std::fmt;

use thiserror::Error;

use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::format::FormatError;
use crate::quota::QuotaError;
use crate::tuple::{TupleError, TupleErrorCode};

/// Severity carried by coded errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// The request is rejected, state unchanged
    Reject,
    /// The operation failed, caller may retry
    Error,
    /// Programming error or exhausted resource
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Reject => "REJECT",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the client should be told
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or schema-violating input
    BadInput,
    /// Quota backpressure, the write may be retried
    Overloaded,
    /// Allocation failure
    OutOfMemory,
    /// Bug or pathological resource exhaustion
    Fatal,
}

impl ErrorKind {
    /// Whether retrying the same request can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Overloaded | ErrorKind::OutOfMemory)
    }
}

/// Umbrella error for the storage layer
#[derive(Debug, Error)]
pub enum BoxError {
    #[error("malformed record: {0}")]
    Codec(#[from] CodecError),

    #[error("{0}")]
    Format(#[from] FormatError),

    #[error("{0}")]
    Tuple(#[from] TupleError),

    #[error("{0}")]
    Quota(#[from] QuotaError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl BoxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BoxError::Codec(_) | BoxError::Config(_) => ErrorKind::BadInput,
            BoxError::Format(e) if e.is_fatal() => ErrorKind::Fatal,
            BoxError::Format(_) => ErrorKind::BadInput,
            BoxError::Tuple(e) => match e.code() {
                TupleErrorCode::TupleOutOfMemory => ErrorKind::OutOfMemory,
                TupleErrorCode::TupleQuotaTimeout => ErrorKind::Overloaded,
                TupleErrorCode::TupleUnknownFormat => ErrorKind::Fatal,
                _ => ErrorKind::BadInput,
            },
            BoxError::Quota(_) => ErrorKind::Overloaded,
        }
    }
}

pub type BoxResult<T> = Result<T, BoxError>;
