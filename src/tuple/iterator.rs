//! Pooled field cursor over one tuple

use super::errors::{TupleError, TupleResult};
use super::tuple::Tuple;
use crate::codec::{decode_array_header, value_len};

/// Forward cursor over the fields of a tuple.
///
/// Holds a handle to the tuple for its whole life and occupies one slot of
/// the context's iterator pool until dropped.
pub struct TupleIterator {
    tuple: Tuple,
    header_len: usize,
    field_count: u32,
    pos: usize,
    fieldno: u32,
}

impl TupleIterator {
    /// Fails with `TUPLE_OUT_OF_MEMORY` when the iterator pool is full, in
    /// which case no reference to `tuple` is taken.
    pub(crate) fn new(tuple: &Tuple) -> TupleResult<Self> {
        let ctx = tuple.context();
        if !ctx.iterator_pool().try_acquire() {
            ctx.metrics().increment_iterator_pool_exhausted();
            return Err(TupleError::out_of_memory(
                std::mem::size_of::<TupleIterator>(),
                "iterator",
            ));
        }
        ctx.metrics().increment_iterators_opened();

        let data = tuple.data();
        let (field_count, header_len) = match decode_array_header(data) {
            Ok((count, body)) => (count, data.len() - body.len()),
            Err(_) => (0, data.len()),
        };
        Ok(Self {
            tuple: tuple.clone(),
            header_len,
            field_count,
            pos: header_len,
            fieldno: 0,
        })
    }

    /// Next field, or `None` at the end
    pub fn next_field(&mut self) -> Option<&[u8]> {
        if self.fieldno >= self.field_count {
            return None;
        }
        let data = self.tuple.data();
        let start = self.pos;
        let len = value_len(&data[start..]).ok()?;
        self.pos += len;
        self.fieldno += 1;
        Some(&data[start..start + len])
    }

    /// Jump to field `fieldno` and return it; the next call to
    /// `next_field` continues after it. Past the end the iterator is
    /// exhausted.
    pub fn seek(&mut self, fieldno: u32) -> Option<&[u8]> {
        match self.tuple.field_offset(fieldno) {
            Some(offset) => {
                self.pos = offset;
                self.fieldno = fieldno;
                self.next_field()
            }
            None => {
                self.pos = self.tuple.data().len();
                self.fieldno = self.field_count;
                None
            }
        }
    }

    /// Back to field 0 of the same tuple
    pub fn rewind(&mut self) {
        self.pos = self.header_len;
        self.fieldno = 0;
    }

    /// Number of the field the next call to `next_field` returns
    pub fn position(&self) -> u32 {
        self.fieldno
    }

    pub fn tuple(&self) -> &Tuple {
        &self.tuple
    }
}

impl Drop for TupleIterator {
    fn drop(&mut self) {
        let ctx = self.tuple.context();
        ctx.iterator_pool().release();
        ctx.metrics().increment_iterators_closed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::context::StorageContext;

    fn ctx_with_iterators(max_iterators: usize) -> StorageContext {
        StorageContext::new(&StorageConfig {
            max_iterators,
            ..StorageConfig::default()
        })
    }

    #[test]
    fn test_iterate_all_fields() {
        let ctx = ctx_with_iterators(4);
        let tuple = ctx
            .new_tuple(&rmp_serde::to_vec(&(1u32, "abc", true)).unwrap())
            .unwrap();
        let mut it = ctx.iterator(&tuple).unwrap();

        assert_eq!(it.position(), 0);
        assert_eq!(it.next_field(), Some(&[0x01][..]));
        assert_eq!(it.next_field(), Some(&[0xa3, b'a', b'b', b'c'][..]));
        assert_eq!(it.next_field(), Some(&[0xc3][..]));
        assert_eq!(it.next_field(), None);
        assert_eq!(it.position(), 3);

        it.rewind();
        assert_eq!(it.next_field(), Some(&[0x01][..]));
    }

    #[test]
    fn test_seek_then_continue() {
        let ctx = ctx_with_iterators(4);
        let tuple = ctx
            .new_tuple(&rmp_serde::to_vec(&(1u32, 2u32, 3u32, 4u32)).unwrap())
            .unwrap();
        let mut it = ctx.iterator(&tuple).unwrap();

        assert_eq!(it.seek(2), Some(&[0x03][..]));
        assert_eq!(it.next_field(), Some(&[0x04][..]));
        assert_eq!(it.next_field(), None);
        assert_eq!(it.seek(9), None);
        assert_eq!(it.next_field(), None);
    }

    #[test]
    fn test_iterator_holds_reference() {
        let ctx = ctx_with_iterators(4);
        let tuple = ctx.new_tuple(&rmp_serde::to_vec(&(1u32,)).unwrap()).unwrap();
        let weak = tuple.downgrade();
        let it = ctx.iterator(&tuple).unwrap();
        assert_eq!(tuple.ref_count(), 2);

        drop(tuple);
        assert!(weak.is_alive());
        drop(it);
        assert!(!weak.is_alive());
    }

    #[test]
    fn test_pool_exhaustion_takes_no_reference() {
        let ctx = ctx_with_iterators(1);
        let tuple = ctx.new_tuple(&rmp_serde::to_vec(&(1u32,)).unwrap()).unwrap();
        let first = ctx.iterator(&tuple).unwrap();

        let err = ctx.iterator(&tuple).err().unwrap();
        assert_eq!(err.code().code(), "TUPLE_OUT_OF_MEMORY");
        assert_eq!(tuple.ref_count(), 2);

        drop(first);
        assert!(ctx.iterator(&tuple).is_ok());
        assert_eq!(ctx.metrics().snapshot().iterator_pool_exhausted, 1);
    }
}
