//! Binary record codec
//!
//! Records are MessagePack arrays. This module never builds a decoded value
//! tree on the hot path: it scans bytes to find value boundaries, which is
//! what the field map, key extraction and iteration need.
//!
//! # Principles
//!
//! - Allocation-free scanning
//! - Never reads out of bounds: truncated input is a `CodecError`
//! - Externally supplied bytes are validated once (`check_record`);
//!   bytes produced by this crate are only checked in debug builds

mod encode;
mod errors;
mod scan;
mod value_type;

pub use encode::{encode_array_header, encode_nil, format_record, sizeof_array_header};
pub use errors::{CodecError, CodecResult};
pub use scan::{check_record, decode_array_header, skip_one_value, value_len};
pub use value_type::{type_of, ValueType};
