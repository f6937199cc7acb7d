//! Codec error types

use thiserror::Error;

use super::value_type::ValueType;

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// A record failed to decode.
///
/// Every variant carries the byte offset where decoding stopped so that a
/// rejected write can be reported precisely.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Input ended in the middle of a value
    #[error("record truncated at byte {offset}")]
    Truncated { offset: usize },

    /// Reserved marker byte (0xc1)
    #[error("invalid marker 0x{byte:02x} at byte {offset}")]
    InvalidMarker { offset: usize, byte: u8 },

    /// Top-level value is not an array
    #[error("expected array, found {found}")]
    NotAnArray { found: ValueType },

    /// Bytes remain after the top-level array
    #[error("trailing bytes after record at byte {offset}")]
    TrailingBytes { offset: usize },
}

impl CodecError {
    /// Byte offset of the failure, if it has one
    pub fn offset(&self) -> Option<usize> {
        match self {
            CodecError::Truncated { offset }
            | CodecError::InvalidMarker { offset, .. }
            | CodecError::TrailingBytes { offset } => Some(*offset),
            CodecError::NotAnArray { .. } => None,
        }
    }
}
