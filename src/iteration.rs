//! Standard iterators over records and keys
//!
//! `TupleIterator` is the pooled, restartable cursor. The types here are
//! plain borrowing iterators for code that just wants to walk fields:
//!
//! - [`Fields`]: the fields of a record or tuple, in order
//! - [`KeyParts`]: the fields a key definition names, in key order

use std::slice;

use crate::codec::{decode_array_header, value_len, CodecResult};
use crate::format::{KeyDef, KeyPart};
use crate::tuple::{Tuple, TupleError, TupleResult};

/// Iterator over the encoded fields of one array
#[derive(Debug, Clone)]
pub struct Fields<'a> {
    rest: &'a [u8],
    remaining: u32,
}

impl<'a> Fields<'a> {
    /// Fields of an encoded array. Only the header is checked here; a
    /// truncated field ends the iteration early.
    pub fn new(record: &'a [u8]) -> CodecResult<Self> {
        let (count, rest) = decode_array_header(record)?;
        Ok(Self {
            rest,
            remaining: count,
        })
    }

    fn empty() -> Self {
        Self {
            rest: &[],
            remaining: 0,
        }
    }
}

impl<'a> Iterator for Fields<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let len = match value_len(self.rest) {
            Ok(len) => len,
            Err(_) => {
                self.remaining = 0;
                return None;
            }
        };
        let (field, rest) = self.rest.split_at(len);
        self.rest = rest;
        self.remaining -= 1;
        Some(field)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining as usize))
    }
}

/// Iterator over the fields a key definition selects from a tuple
pub struct KeyParts<'a> {
    tuple: &'a Tuple,
    parts: slice::Iter<'a, KeyPart>,
}

impl<'a> Iterator for KeyParts<'a> {
    type Item = TupleResult<(&'a KeyPart, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.parts.next()?;
        Some(
            self.tuple
                .field(part.fieldno)
                .map(|field| (part, field))
                .ok_or_else(|| TupleError::field_missing(part.fieldno)),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.parts.size_hint()
    }
}

impl ExactSizeIterator for KeyParts<'_> {}

impl Tuple {
    /// Borrowing iterator over all fields; takes no pool slot
    pub fn fields(&self) -> Fields<'_> {
        Fields::new(self.data()).unwrap_or_else(|_| Fields::empty())
    }

    /// The fields `key_def` names, in key order, without building the key
    pub fn key_parts<'a>(&'a self, key_def: &'a KeyDef) -> KeyParts<'a> {
        KeyParts {
            tuple: self,
            parts: key_def.parts().iter(),
        }
    }
}

impl<'a> IntoIterator for &'a Tuple {
    type Item = &'a [u8];
    type IntoIter = Fields<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields()
    }
}
