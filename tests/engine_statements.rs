//! Engine Statement Tests
//!
//! Statements as an LSM engine produces them across two indexes:
//! - Upserts squash into replaces with the same LSN
//! - Deletes keep exactly the indexed fields
//! - Statements copied under another format keep their metadata
//! - Select keys compare equal to keys extracted from records

use tuplebox::codec::format_record;
use tuplebox::format::{FieldType, FormatDef, KeyDef};
use tuplebox::tuple::StatementType;
use tuplebox::{FormatPin, StorageContext};

// =============================================================================
// Helper Functions
// =============================================================================

fn record<T: serde::Serialize>(value: &T) -> Vec<u8> {
    rmp_serde::to_vec(value).unwrap()
}

fn primary() -> KeyDef {
    KeyDef::from_fields(&[(0, FieldType::Unsigned)])
}

fn secondary() -> KeyDef {
    KeyDef::from_fields(&[(2, FieldType::String)])
}

/// Format of the space with both indexes, and the primary-only format
fn formats(ctx: &StorageContext) -> (FormatPin, FormatPin) {
    let space = ctx
        .pin_format(&FormatDef::engine(vec![primary(), secondary()]))
        .unwrap();
    let pk_only = ctx.pin_format(&FormatDef::engine(vec![primary()])).unwrap();
    (space, pk_only)
}

// =============================================================================
// Statement Flow Tests
// =============================================================================

/// An upsert squashed into a replace carries the upsert's LSN and record.
#[test]
fn test_upsert_squash() {
    let ctx = StorageContext::default();
    let (space, _) = formats(&ctx);

    let upsert = ctx
        .new_upsert(
            space.id(),
            &record(&(1u32, 10u32, "alice")),
            &record(&vec![("+", 1u32, 5u32)]),
        )
        .unwrap();
    upsert.set_lsn(100);
    upsert.set_n_upserts(1);

    let replace = ctx.replace_from_upsert(space.id(), &upsert).unwrap();
    assert_eq!(replace.to_string(), r#"REPLACE([1, 10, "alice"], lsn=100)"#);
    assert_eq!(replace.bsize(), upsert.bsize() - upsert.upsert_ops().len());
    assert_eq!(
        replace.extract_key(&secondary()).unwrap(),
        upsert.extract_key(&secondary()).unwrap()
    );
}

/// Deletes built from a full record keep every indexed field and nothing else.
#[test]
fn test_delete_keeps_indexed_fields() {
    let ctx = StorageContext::default();
    let (space, pk_only) = formats(&ctx);
    let source = ctx
        .new_replace(space.id(), &record(&(7u32, 42u32, "bob", "extra")))
        .unwrap();

    let delete = ctx.new_surrogate_delete(space.id(), &source).unwrap();
    assert_eq!(delete.statement_type(), Some(StatementType::Delete));
    assert_eq!(format_record(delete.data()), r#"[7, nil, "bob"]"#);

    let pk_delete = ctx.new_surrogate_delete(pk_only.id(), &source).unwrap();
    assert_eq!(format_record(pk_delete.data()), "[7]");
}

/// A delete built from a secondary key places the key at its field.
#[test]
fn test_delete_from_secondary_key() {
    let ctx = StorageContext::default();
    let (space, _) = formats(&ctx);

    let delete = ctx
        .new_surrogate_from_key(space.id(), &record(&("carol",)), &secondary(), StatementType::Delete)
        .unwrap();
    assert_eq!(format_record(delete.data()), r#"[nil, nil, "carol"]"#);
    assert_eq!(
        delete.extract_key(&secondary()).unwrap(),
        record(&("carol",))
    );
}

/// Statements copied into another format keep type, LSN and upsert counter.
#[test]
fn test_dup_into_other_format() {
    let ctx = StorageContext::default();
    let (space, pk_only) = formats(&ctx);
    let stmt = ctx
        .new_replace(space.id(), &record(&(3u32, 1u32, "dave")))
        .unwrap();
    stmt.set_lsn(77);

    let copy = ctx.dup_statement(&stmt, pk_only.id()).unwrap();
    assert_eq!(copy.format_id(), pk_only.id());
    assert_eq!(copy.statement_type(), Some(StatementType::Replace));
    assert_eq!(copy.lsn(), Some(77));
    assert_eq!(copy.data(), stmt.data());
    assert_eq!(ctx.formats().refs(pk_only.id()), Some(2));
}

/// A select key equals the key extracted from a matching record.
#[test]
fn test_select_matches_extracted_key() {
    let ctx = StorageContext::default();
    let (space, _) = formats(&ctx);
    let stmt = ctx
        .new_replace(space.id(), &record(&(9u32, 0u32, "eve")))
        .unwrap();

    let select = ctx.new_select(space.id(), &record(&9u32), 1).unwrap();
    assert_eq!(select.data(), stmt.extract_key(&primary()).unwrap().as_slice());
    assert_eq!(select.to_string(), "SELECT([9], lsn=0)");
}

/// Every statement returns its charge when dropped.
#[test]
fn test_statements_release_quota() {
    let ctx = StorageContext::default();
    let (space, pk_only) = formats(&ctx);
    {
        let replace = ctx
            .new_replace(space.id(), &record(&(1u32, 2u32, "f")))
            .unwrap();
        let _delete = ctx.new_surrogate_delete(space.id(), &replace).unwrap();
        let _copy = ctx.dup_statement(&replace, pk_only.id()).unwrap();
        let _select = ctx.new_select(space.id(), &record(&1u32), 1).unwrap();
        assert!(ctx.quota().used() > 0);
    }
    assert_eq!(ctx.quota().used(), 0);
}
