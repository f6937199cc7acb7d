//! Tuple error types
//!
//! Error codes:
//! - TUPLE_OUT_OF_MEMORY (ERROR)
//! - TUPLE_MALFORMED (REJECT)
//! - TUPLE_FIELD_COUNT_MISMATCH (REJECT)
//! - TUPLE_FIELD_TYPE_MISMATCH (REJECT)
//! - TUPLE_FIELD_MISSING (REJECT)
//! - TUPLE_QUOTA_TIMEOUT (ERROR)
//! - TUPLE_UNKNOWN_FORMAT (FATAL)

use std::fmt;

use crate::codec::{CodecError, ValueType};
use crate::error::Severity;
use crate::format::FieldType;
use crate::quota::{QuotaError, TimeoutReason};

/// Tuple-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleErrorCode {
    /// Allocation of a tuple, iterator or key failed
    TupleOutOfMemory,
    /// Record is not a well-formed array
    TupleMalformed,
    /// Record has the wrong number of fields
    TupleFieldCountMismatch,
    /// A constrained field holds a value of the wrong type
    TupleFieldTypeMismatch,
    /// A key part names a field the record does not have
    TupleFieldMissing,
    /// The write waited for quota and gave up
    TupleQuotaTimeout,
    /// The format id does not resolve
    TupleUnknownFormat,
}

impl TupleErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            TupleErrorCode::TupleOutOfMemory => "TUPLE_OUT_OF_MEMORY",
            TupleErrorCode::TupleMalformed => "TUPLE_MALFORMED",
            TupleErrorCode::TupleFieldCountMismatch => "TUPLE_FIELD_COUNT_MISMATCH",
            TupleErrorCode::TupleFieldTypeMismatch => "TUPLE_FIELD_TYPE_MISMATCH",
            TupleErrorCode::TupleFieldMissing => "TUPLE_FIELD_MISSING",
            TupleErrorCode::TupleQuotaTimeout => "TUPLE_QUOTA_TIMEOUT",
            TupleErrorCode::TupleUnknownFormat => "TUPLE_UNKNOWN_FORMAT",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            TupleErrorCode::TupleOutOfMemory => Severity::Error,
            TupleErrorCode::TupleMalformed => Severity::Reject,
            TupleErrorCode::TupleFieldCountMismatch => Severity::Reject,
            TupleErrorCode::TupleFieldTypeMismatch => Severity::Reject,
            TupleErrorCode::TupleFieldMissing => Severity::Reject,
            TupleErrorCode::TupleQuotaTimeout => Severity::Error,
            TupleErrorCode::TupleUnknownFormat => Severity::Fatal,
        }
    }
}

impl fmt::Display for TupleErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Tuple error with context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleError {
    code: TupleErrorCode,
    message: String,
    fieldno: Option<u32>,
}

impl TupleError {
    fn new(code: TupleErrorCode, message: String) -> Self {
        Self {
            code,
            message,
            fieldno: None,
        }
    }

    fn for_field(code: TupleErrorCode, fieldno: u32, message: String) -> Self {
        Self {
            code,
            message,
            fieldno: Some(fieldno),
        }
    }

    /// Allocation of `size` bytes for `what` failed
    pub fn out_of_memory(size: usize, what: &str) -> Self {
        Self::new(
            TupleErrorCode::TupleOutOfMemory,
            format!("failed to allocate {} bytes for {}", size, what),
        )
    }

    /// Record failed to decode
    pub fn malformed(source: &CodecError) -> Self {
        Self::new(TupleErrorCode::TupleMalformed, source.to_string())
    }

    /// Field count differs from the required count
    pub fn field_count_mismatch(expected: u32, actual: u32) -> Self {
        Self::new(
            TupleErrorCode::TupleFieldCountMismatch,
            format!("expected {} fields, got {}", expected, actual),
        )
    }

    /// Field count below the number of constrained fields
    pub fn too_few_fields(required: u32, actual: u32) -> Self {
        Self::new(
            TupleErrorCode::TupleFieldCountMismatch,
            format!(
                "field count {} is less than the {} required by the format",
                actual, required
            ),
        )
    }

    /// Field `fieldno` holds a value of the wrong type
    pub fn field_type_mismatch(fieldno: u32, expected: FieldType, actual: ValueType) -> Self {
        Self::for_field(
            TupleErrorCode::TupleFieldTypeMismatch,
            fieldno,
            format!(
                "field {} type does not match: expected {}, got {}",
                fieldno, expected, actual
            ),
        )
    }

    /// Field `fieldno` is not present
    pub fn field_missing(fieldno: u32) -> Self {
        Self::for_field(
            TupleErrorCode::TupleFieldMissing,
            fieldno,
            format!("field {} is missing", fieldno),
        )
    }

    /// Quota wait for `size` bytes ended without admission
    pub fn quota_timeout(size: usize, reason: TimeoutReason) -> Self {
        Self::new(
            TupleErrorCode::TupleQuotaTimeout,
            format!("memory quota wait for {} bytes {}", size, reason),
        )
    }

    /// Format id does not resolve
    pub fn unknown_format(id: u16) -> Self {
        Self::new(
            TupleErrorCode::TupleUnknownFormat,
            format!("format {} does not exist", id),
        )
    }

    /// Returns the error code
    pub fn code(&self) -> TupleErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Field the error refers to, if any
    pub fn fieldno(&self) -> Option<u32> {
        self.fieldno
    }

    /// Whether the same request may succeed later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            TupleErrorCode::TupleQuotaTimeout | TupleErrorCode::TupleOutOfMemory
        )
    }
}

impl fmt::Display for TupleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for TupleError {}

impl From<CodecError> for TupleError {
    fn from(err: CodecError) -> Self {
        Self::malformed(&err)
    }
}

impl From<QuotaError> for TupleError {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::Timeout { size, reason } => Self::quota_timeout(size, reason),
        }
    }
}

/// Result type for tuple operations
pub type TupleResult<T> = Result<T, TupleError>;
