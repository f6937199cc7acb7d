//! Record validation against a format

use super::errors::{TupleError, TupleResult};
use crate::codec::{check_record, decode_array_header, skip_one_value, type_of};
use crate::format::TupleFormat;

/// Check that `record` is a well-formed array that satisfies `format`.
///
/// Field count is checked first: an exact count must match, otherwise the
/// record needs at least the constrained fields. Types are then checked in
/// field order and the first mismatch is reported.
pub fn validate(format: &TupleFormat, record: &[u8]) -> TupleResult<()> {
    let count = check_record(record)?;

    if let Some(exact) = format.exact_field_count() {
        if count != exact {
            return Err(TupleError::field_count_mismatch(exact, count));
        }
    }
    if count < format.field_count() {
        return Err(TupleError::too_few_fields(format.field_count(), count));
    }

    let (_, mut rest) = decode_array_header(record)?;
    for (fieldno, field) in format.fields().iter().enumerate() {
        let actual = type_of(rest[0]);
        if !field.field_type.is_compatible(actual) {
            return Err(TupleError::field_type_mismatch(
                fieldno as u32,
                field.field_type,
                actual,
            ));
        }
        rest = skip_one_value(rest)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{FieldType, FormatDef, FormatRegistry, KeyDef};
    use crate::tuple::TupleErrorCode;
    use std::sync::Arc;

    fn format(def: FormatDef) -> Arc<TupleFormat> {
        let registry = FormatRegistry::default();
        let id = registry.register_format(&def).unwrap();
        registry.lookup(id).unwrap()
    }

    fn two_field_format() -> Arc<TupleFormat> {
        format(FormatDef::runtime(vec![KeyDef::from_fields(&[
            (0, FieldType::Unsigned),
            (1, FieldType::String),
        ])]))
    }

    #[test]
    fn test_valid_record() {
        let record = rmp_serde::to_vec(&(1u32, "a", 3.5f64)).unwrap();
        assert!(validate(&two_field_format(), &record).is_ok());
    }

    #[test]
    fn test_too_few_fields() {
        let record = rmp_serde::to_vec(&(1u32,)).unwrap();
        let err = validate(&two_field_format(), &record).unwrap_err();
        assert_eq!(err.code(), TupleErrorCode::TupleFieldCountMismatch);
    }

    #[test]
    fn test_exact_count() {
        let fmt = format(FormatDef::runtime(Vec::new()).with_exact_field_count(2));
        let ok = rmp_serde::to_vec(&(1u32, 2u32)).unwrap();
        let extra = rmp_serde::to_vec(&(1u32, 2u32, 3u32)).unwrap();
        assert!(validate(&fmt, &ok).is_ok());
        let err = validate(&fmt, &extra).unwrap_err();
        assert_eq!(err.code(), TupleErrorCode::TupleFieldCountMismatch);
    }

    #[test]
    fn test_first_type_mismatch_reported() {
        let record = rmp_serde::to_vec(&(-1i32, 2u32)).unwrap();
        let err = validate(&two_field_format(), &record).unwrap_err();
        assert_eq!(err.code(), TupleErrorCode::TupleFieldTypeMismatch);
        assert_eq!(err.fieldno(), Some(0));
    }

    #[test]
    fn test_schemaless_accepts_anything() {
        let fmt = format(FormatDef::runtime(Vec::new()));
        let record = rmp_serde::to_vec(&((), "x", vec![1u8])).unwrap();
        assert!(validate(&fmt, &record).is_ok());
        assert!(validate(&fmt, &[0x90]).is_ok());
    }

    #[test]
    fn test_malformed() {
        let err = validate(&two_field_format(), &[0x92, 0x01]).unwrap_err();
        assert_eq!(err.code(), TupleErrorCode::TupleMalformed);
    }
}
