//! Key extraction
//!
//! A key is a fresh encoded array holding the fields a key definition
//! names, in the definition's order. Both variants size the key first and
//! then fill one exactly sized buffer, which the caller owns.

use std::ops::Range;

use super::errors::{TupleError, TupleResult};
use super::pool::alloc_exact;
use super::tuple::Tuple;
use crate::codec::{decode_array_header, encode_array_header, sizeof_array_header, value_len};
use crate::format::KeyDef;

impl Tuple {
    /// Build the key of this tuple for `key_def`
    pub fn extract_key(&self, key_def: &KeyDef) -> TupleResult<Vec<u8>> {
        let mut size = sizeof_array_header(key_def.part_count());
        for part in key_def.parts() {
            let field = self
                .field(part.fieldno)
                .ok_or_else(|| TupleError::field_missing(part.fieldno))?;
            size += field.len();
        }

        let mut key = alloc_exact(size, "key")?;
        encode_array_header(&mut key, key_def.part_count());
        for part in key_def.parts() {
            if let Some(field) = self.field(part.fieldno) {
                key.extend_from_slice(field);
            }
        }
        debug_assert_eq!(key.len(), size);

        self.context().metrics().increment_key_extractions();
        Ok(key)
    }
}

/// Build the key of a raw record for `key_def` without constructing a
/// tuple. `data` must start with the record's array header; bytes after
/// the record are ignored.
pub fn extract_key_raw(data: &[u8], key_def: &KeyDef) -> TupleResult<Vec<u8>> {
    let mut size = sizeof_array_header(key_def.part_count());
    let mut scan = RawScan::new(data)?;
    for part in key_def.parts() {
        size += scan.locate(part.fieldno)?.len();
    }

    let mut key = alloc_exact(size, "key")?;
    encode_array_header(&mut key, key_def.part_count());
    let mut scan = RawScan::new(data)?;
    for part in key_def.parts() {
        let range = scan.locate(part.fieldno)?;
        key.extend_from_slice(&data[range]);
    }
    debug_assert_eq!(key.len(), size);
    Ok(key)
}

/// Forward-only field locator over a raw record.
///
/// Moving to a lower field number restarts from field 0. Asking for the
/// same field twice in a row reuses the previous answer.
struct RawScan<'a> {
    data: &'a [u8],
    header_len: usize,
    field_count: u32,
    pos: usize,
    next_fieldno: u32,
    last: Option<(u32, Range<usize>)>,
}

impl<'a> RawScan<'a> {
    fn new(data: &'a [u8]) -> TupleResult<Self> {
        let (field_count, body) = decode_array_header(data)?;
        let header_len = data.len() - body.len();
        Ok(Self {
            data,
            header_len,
            field_count,
            pos: header_len,
            next_fieldno: 0,
            last: None,
        })
    }

    fn locate(&mut self, fieldno: u32) -> TupleResult<Range<usize>> {
        if let Some((last_fieldno, range)) = &self.last {
            if *last_fieldno == fieldno {
                return Ok(range.clone());
            }
        }
        if fieldno >= self.field_count {
            return Err(TupleError::field_missing(fieldno));
        }
        if fieldno < self.next_fieldno {
            self.pos = self.header_len;
            self.next_fieldno = 0;
        }
        while self.next_fieldno < fieldno {
            self.pos += value_len(&self.data[self.pos..])?;
            self.next_fieldno += 1;
        }

        let end = self.pos + value_len(&self.data[self.pos..])?;
        let range = self.pos..end;
        self.pos = end;
        self.next_fieldno = fieldno + 1;
        self.last = Some((fieldno, range.clone()));
        Ok(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::context::StorageContext;
    use crate::format::FieldType;

    fn key_def(fields: &[u32]) -> KeyDef {
        let parts: Vec<(u32, FieldType)> = fields.iter().map(|f| (*f, FieldType::Any)).collect();
        KeyDef::from_fields(&parts)
    }

    fn decode(key: &[u8]) -> rmpv::Value {
        rmpv::decode::read_value(&mut &key[..]).unwrap()
    }

    #[test]
    fn test_out_of_order_parts() {
        let data = rmp_serde::to_vec(&(10u32, "a", 20u32, "b")).unwrap();
        let key = extract_key_raw(&data, &key_def(&[3, 1])).unwrap();
        assert_eq!(decode(&key).to_string(), r#"["b", "a"]"#);
    }

    #[test]
    fn test_repeated_part() {
        let data = rmp_serde::to_vec(&(10u32, "a", 20u32)).unwrap();
        let key = extract_key_raw(&data, &key_def(&[2, 2, 0])).unwrap();
        assert_eq!(decode(&key).to_string(), "[20, 20, 10]");
    }

    #[test]
    fn test_empty_key() {
        let data = rmp_serde::to_vec(&(10u32,)).unwrap();
        let key = extract_key_raw(&data, &KeyDef::new(Vec::new())).unwrap();
        assert_eq!(key, vec![0x90]);
    }

    #[test]
    fn test_missing_field() {
        let data = rmp_serde::to_vec(&(10u32, "a")).unwrap();
        let err = extract_key_raw(&data, &key_def(&[0, 5])).unwrap_err();
        assert_eq!(err.fieldno(), Some(5));
    }

    #[test]
    fn test_truncated_raw_record() {
        let mut data = rmp_serde::to_vec(&(10u32, "abcdef")).unwrap();
        data.truncate(data.len() - 3);
        let err = extract_key_raw(&data, &key_def(&[1])).unwrap_err();
        assert_eq!(err.code().code(), "TUPLE_MALFORMED");
    }

    #[test]
    fn test_tuple_and_raw_agree() {
        let ctx = StorageContext::new(&StorageConfig::default());
        let data = rmp_serde::to_vec(&(1u32, "x", (2u32, 3u32), -4i32, "y")).unwrap();
        let tuple = ctx.new_tuple(&data).unwrap();
        let def = key_def(&[4, 2, 0, 2]);

        let from_tuple = tuple.extract_key(&def).unwrap();
        let from_raw = extract_key_raw(&data, &def).unwrap();
        assert_eq!(from_tuple, from_raw);
        assert_eq!(decode(&from_tuple).to_string(), r#"["y", [2, 3], 1, [2, 3]]"#);
        assert_eq!(ctx.metrics().snapshot().key_extractions, 1);
    }
}
