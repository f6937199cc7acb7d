//! Format type definitions
//!
//! Field types supported by key parts:
//! - any: no constraint
//! - unsigned: non-negative integer
//! - integer: any integer
//! - number: integer or float
//! - string: UTF-8 string
//! - scalar: any non-container, non-nil value
//! - array / map: containers

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{FormatError, FormatResult};
use super::key_def::KeyDef;
use crate::codec::ValueType;

/// Type a key part expects in a record field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Any,
    Unsigned,
    Integer,
    Number,
    String,
    Scalar,
    Array,
    Map,
}

impl FieldType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::Any => "any",
            FieldType::Unsigned => "unsigned",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::String => "string",
            FieldType::Scalar => "scalar",
            FieldType::Array => "array",
            FieldType::Map => "map",
        }
    }

    /// Whether a value of runtime type `value` may be stored in a field of
    /// this type.
    pub fn is_compatible(&self, value: ValueType) -> bool {
        match self {
            FieldType::Any => true,
            FieldType::Unsigned => value == ValueType::UInt,
            FieldType::Integer => matches!(value, ValueType::UInt | ValueType::Int),
            FieldType::Number => {
                matches!(value, ValueType::UInt | ValueType::Int | ValueType::Float)
            }
            FieldType::String => value == ValueType::Str,
            FieldType::Scalar => value.is_scalar(),
            FieldType::Array => value == ValueType::Array,
            FieldType::Map => value == ValueType::Map,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Registry-assigned format identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormatId(u16);

impl FormatId {
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Destruction behavior of tuples bound to a format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    /// Standalone tuples: buffer freed on destruction
    Runtime,
    /// Engine statements: buffer returned to the statement pool
    Engine,
}

impl FormatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatKind::Runtime => "runtime",
            FormatKind::Engine => "engine",
        }
    }
}

/// Constraint on one leading record field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldFormat {
    pub field_type: FieldType,
    /// Named by at least one key part
    pub indexed: bool,
    /// Slot in the field map, if the field is indexed and not field 0
    pub offset_slot: Option<u32>,
}

impl FieldFormat {
    fn unconstrained() -> Self {
        Self {
            field_type: FieldType::Any,
            indexed: false,
            offset_slot: None,
        }
    }
}

/// Input to `FormatRegistry::register_format`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDef {
    pub kind: FormatKind,
    pub key_defs: Vec<KeyDef>,
    pub exact_field_count: Option<u32>,
}

impl FormatDef {
    /// Format for standalone tuples over the given indexes
    pub fn runtime(key_defs: Vec<KeyDef>) -> Self {
        Self {
            kind: FormatKind::Runtime,
            key_defs,
            exact_field_count: None,
        }
    }

    /// Format for engine statements over the given indexes
    pub fn engine(key_defs: Vec<KeyDef>) -> Self {
        Self {
            kind: FormatKind::Engine,
            key_defs,
            exact_field_count: None,
        }
    }

    /// Require records to have exactly `count` fields
    pub fn with_exact_field_count(mut self, count: u32) -> Self {
        self.exact_field_count = Some(count);
        self
    }
}

/// Structural identity of a format, used for deduplication
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct FormatLayout {
    pub kind: FormatKind,
    pub fields: Vec<FieldFormat>,
    pub exact_field_count: Option<u32>,
    pub field_map_size: u32,
}

impl FormatLayout {
    /// Merges the key definitions into per-field constraints and assigns
    /// field map slots in field order.
    ///
    /// Field numbers above [`TupleFormat::MAX_FIELD_NO`] are rejected before
    /// anything is allocated.
    pub fn build(def: &FormatDef) -> FormatResult<Self> {
        let too_large = def
            .key_defs
            .iter()
            .flat_map(|key_def| key_def.parts())
            .find(|part| part.fieldno > TupleFormat::MAX_FIELD_NO);
        if let Some(part) = too_large {
            return Err(FormatError::field_no_too_large(
                part.fieldno,
                TupleFormat::MAX_FIELD_NO,
            ));
        }

        let field_count = def
            .key_defs
            .iter()
            .map(KeyDef::min_field_count)
            .max()
            .unwrap_or(0);
        let mut fields = vec![FieldFormat::unconstrained(); field_count as usize];

        for key_def in &def.key_defs {
            for part in key_def.parts() {
                let field = &mut fields[part.fieldno as usize];
                field.indexed = true;
                if part.field_type == FieldType::Any || field.field_type == part.field_type {
                    continue;
                }
                if field.field_type != FieldType::Any {
                    return Err(FormatError::field_type_conflict(
                        part.fieldno,
                        field.field_type.type_name(),
                        part.field_type.type_name(),
                    ));
                }
                field.field_type = part.field_type;
            }
        }

        // Field 0 starts right after the array header, no slot needed.
        let mut field_map_size = 0u32;
        for field in fields.iter_mut().skip(1) {
            if field.indexed {
                field.offset_slot = Some(field_map_size);
                field_map_size += 1;
            }
        }

        Ok(Self {
            kind: def.kind,
            fields,
            exact_field_count: def.exact_field_count,
            field_map_size,
        })
    }
}

/// Shared format descriptor
#[derive(Debug, PartialEq, Eq)]
pub struct TupleFormat {
    id: FormatId,
    layout: FormatLayout,
}

impl TupleFormat {
    /// Highest field number a key part may name
    pub const MAX_FIELD_NO: u32 = u16::MAX as u32;

    pub(crate) fn new(id: FormatId, layout: FormatLayout) -> Self {
        Self { id, layout }
    }

    pub fn id(&self) -> FormatId {
        self.id
    }

    pub fn kind(&self) -> FormatKind {
        self.layout.kind
    }

    /// Constrained leading fields
    pub fn fields(&self) -> &[FieldFormat] {
        &self.layout.fields
    }

    /// Minimum number of fields a record must have
    pub fn field_count(&self) -> u32 {
        self.layout.fields.len() as u32
    }

    pub fn exact_field_count(&self) -> Option<u32> {
        self.layout.exact_field_count
    }

    /// Number of slots in the field map
    pub fn field_map_size(&self) -> u32 {
        self.layout.field_map_size
    }

    /// Bytes the field map occupies in front of the payload
    pub fn field_map_bytes(&self) -> usize {
        self.layout.field_map_size as usize * std::mem::size_of::<u32>()
    }

    /// Whether some key part names `fieldno`
    pub fn is_indexed(&self, fieldno: u32) -> bool {
        self.layout
            .fields
            .get(fieldno as usize)
            .map_or(false, |f| f.indexed)
    }

    /// Field map slot of `fieldno`, if it has one
    pub fn offset_slot(&self, fieldno: u32) -> Option<u32> {
        self.layout
            .fields
            .get(fieldno as usize)
            .and_then(|f| f.offset_slot)
    }

    pub(crate) fn layout(&self) -> &FormatLayout {
        &self.layout
    }
}
