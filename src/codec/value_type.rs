//! Value type classification by leading marker byte

use std::fmt;

use rmp::Marker;

/// Runtime type of one encoded value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Nil,
    Bool,
    /// Non-negative integer
    UInt,
    /// Negative integer (or a signed encoding)
    Int,
    /// 32 or 64 bit float
    Float,
    Str,
    Bin,
    Array,
    Map,
    Ext,
}

impl ValueType {
    /// Returns the type name for error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Nil => "nil",
            ValueType::Bool => "boolean",
            ValueType::UInt => "unsigned",
            ValueType::Int => "integer",
            ValueType::Float => "float",
            ValueType::Str => "string",
            ValueType::Bin => "binary",
            ValueType::Array => "array",
            ValueType::Map => "map",
            ValueType::Ext => "extension",
        }
    }

    /// True for scalar values (everything except containers and nil)
    pub fn is_scalar(&self) -> bool {
        !matches!(self, ValueType::Nil | ValueType::Array | ValueType::Map)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classifies a value by its leading byte.
///
/// The reserved marker 0xc1 maps to `Ext`; scanning rejects it separately.
pub fn type_of(byte: u8) -> ValueType {
    match Marker::from_u8(byte) {
        Marker::Null => ValueType::Nil,
        Marker::True | Marker::False => ValueType::Bool,
        Marker::FixPos(_) | Marker::U8 | Marker::U16 | Marker::U32 | Marker::U64 => ValueType::UInt,
        Marker::FixNeg(_) | Marker::I8 | Marker::I16 | Marker::I32 | Marker::I64 => ValueType::Int,
        Marker::F32 | Marker::F64 => ValueType::Float,
        Marker::FixStr(_) | Marker::Str8 | Marker::Str16 | Marker::Str32 => ValueType::Str,
        Marker::Bin8 | Marker::Bin16 | Marker::Bin32 => ValueType::Bin,
        Marker::FixArray(_) | Marker::Array16 | Marker::Array32 => ValueType::Array,
        Marker::FixMap(_) | Marker::Map16 | Marker::Map32 => ValueType::Map,
        _ => ValueType::Ext,
    }
}
