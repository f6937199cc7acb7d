//! Format error types
//!
//! Error codes:
//! - TUPLE_UNKNOWN_FORMAT (FATAL)
//! - TUPLE_FORMAT_SPACE_EXHAUSTED (FATAL)
//! - TUPLE_FIELD_TYPE_CONFLICT (REJECT)
//! - TUPLE_FIELD_NO_TOO_LARGE (REJECT)

use std::fmt;

use crate::error::Severity;

/// Format-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatErrorCode {
    /// Format id was retired or never allocated
    TupleUnknownFormat,
    /// No free format ids remain
    TupleFormatSpaceExhausted,
    /// Two key parts constrain one field to different types
    TupleFieldTypeConflict,
    /// A key part names a field beyond the supported range
    TupleFieldNoTooLarge,
}

impl FormatErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            FormatErrorCode::TupleUnknownFormat => "TUPLE_UNKNOWN_FORMAT",
            FormatErrorCode::TupleFormatSpaceExhausted => "TUPLE_FORMAT_SPACE_EXHAUSTED",
            FormatErrorCode::TupleFieldTypeConflict => "TUPLE_FIELD_TYPE_CONFLICT",
            FormatErrorCode::TupleFieldNoTooLarge => "TUPLE_FIELD_NO_TOO_LARGE",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            FormatErrorCode::TupleUnknownFormat => Severity::Fatal,
            FormatErrorCode::TupleFormatSpaceExhausted => Severity::Fatal,
            FormatErrorCode::TupleFieldTypeConflict => Severity::Reject,
            FormatErrorCode::TupleFieldNoTooLarge => Severity::Reject,
        }
    }
}

impl fmt::Display for FormatErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Format error with context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatError {
    code: FormatErrorCode,
    message: String,
}

impl FormatError {
    /// Lookup of a retired or never allocated id
    pub fn unknown_format(id: u16) -> Self {
        Self {
            code: FormatErrorCode::TupleUnknownFormat,
            message: format!("format {} does not exist", id),
        }
    }

    /// Id space exhausted
    pub fn space_exhausted(max_formats: usize) -> Self {
        Self {
            code: FormatErrorCode::TupleFormatSpaceExhausted,
            message: format!("all {} format ids are in use", max_formats),
        }
    }

    /// Conflicting key part types for one field
    pub fn field_type_conflict(fieldno: u32, first: &str, second: &str) -> Self {
        Self {
            code: FormatErrorCode::TupleFieldTypeConflict,
            message: format!(
                "field {} is indexed as both {} and {}",
                fieldno, first, second
            ),
        }
    }

    /// Key part field number above `max`
    pub fn field_no_too_large(fieldno: u32, max: u32) -> Self {
        Self {
            code: FormatErrorCode::TupleFieldNoTooLarge,
            message: format!("key part field {} exceeds the maximum of {}", fieldno, max),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> FormatErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns whether this error is fatal
    pub fn is_fatal(&self) -> bool {
        self.code.severity() == Severity::Fatal
    }
}

impl fmt::Display for FormatError {
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

impl std::error::Error for FormatError {}

/// Result type for format operations
pub type FormatResult<T> = Result<T, FormatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(FormatErrorCode::TupleUnknownFormat.code(), "TUPLE_UNKNOWN_FORMAT");
        assert_eq!(
            FormatErrorCode::TupleFormatSpaceExhausted.code(),
            "TUPLE_FORMAT_SPACE_EXHAUSTED"
        );
        assert_eq!(
            FormatErrorCode::TupleFieldTypeConflict.code(),
            "TUPLE_FIELD_TYPE_CONFLICT"
        );
    }

    #[test]
    fn test_unknown_format_is_fatal() {
        assert!(FormatError::unknown_format(3).is_fatal());
        assert!(FormatError::space_exhausted(10).is_fatal());
        assert!(!FormatError::field_type_conflict(1, "string", "unsigned").is_fatal());
        assert!(!FormatError::field_no_too_large(1 << 20, 65_535).is_fatal());
    }

    #[test]
    fn test_display() {
        let display = FormatError::unknown_format(42).to_string();
        assert!(display.contains("FATAL"));
        assert!(display.contains("TUPLE_UNKNOWN_FORMAT"));
        assert!(display.contains("42"));
    }
}
