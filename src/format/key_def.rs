//! Key definitions
//!
//! A key definition is the ordered list of fields an index is built on.
//! Order matters: extracted keys follow part order, not record order, and
//! parts may repeat or go backwards.

use super::types::FieldType;

/// One key part: a field number and the type the index expects there
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyPart {
    /// Zero-based field number in the record
    pub fieldno: u32,
    /// Expected field type
    pub field_type: FieldType,
}

impl KeyPart {
    pub fn new(fieldno: u32, field_type: FieldType) -> Self {
        Self {
            fieldno,
            field_type,
        }
    }
}

/// Ordered key definition of one index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyDef {
    parts: Vec<KeyPart>,
}

impl KeyDef {
    /// Create a key definition from parts in declared order
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self { parts }
    }

    /// Shorthand for `(fieldno, type)` pairs
    pub fn from_fields(fields: &[(u32, FieldType)]) -> Self {
        Self {
            parts: fields
                .iter()
                .map(|(fieldno, field_type)| KeyPart::new(*fieldno, *field_type))
                .collect(),
        }
    }

    /// Parts in declared order
    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    pub fn part_count(&self) -> u32 {
        self.parts.len() as u32
    }

    /// Smallest record field count that contains every part
    pub fn min_field_count(&self) -> u32 {
        self.parts
            .iter()
            .map(|p| p.fieldno.saturating_add(1))
            .max()
            .unwrap_or(0)
    }
}
