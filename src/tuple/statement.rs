//! Engine statements
//!
//! A statement is a tuple that additionally carries an LSN and a statement
//! type. Statements are built over engine formats, so their buffers come
//! from and go back to the statement pool.
//!
//! - REPLACE: a full record
//! - UPSERT: a full record followed by an array of update operations
//! - DELETE: a surrogate record, indexed fields only, the rest nil
//! - SELECT: a bare key, no field map

use std::fmt;
use std::sync::atomic::Ordering;

use super::errors::{TupleError, TupleResult};
use super::tuple::{Charge, Tuple, TupleBuilder};
use super::validate::validate;
use crate::codec::{check_record, decode_array_header, encode_array_header, format_record, value_len};
use crate::context::StorageContext;
use crate::format::{FormatId, KeyDef};
use crate::quota::CancelToken;

/// Kind of change a statement describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementType {
    Replace,
    Delete,
    Upsert,
    Select,
}

impl StatementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementType::Replace => "REPLACE",
            StatementType::Delete => "DELETE",
            StatementType::Upsert => "UPSERT",
            StatementType::Select => "SELECT",
        }
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const NIL: &[u8] = &[0xc0];

/// Render a key for diagnostics; an empty slice renders as `[]`
pub fn key_to_string(key: &[u8]) -> String {
    if key.is_empty() {
        return "[]".to_string();
    }
    format_record(key)
}

impl Tuple {
    /// Statement type, `None` for plain tuples
    pub fn statement_type(&self) -> Option<StatementType> {
        self.statement_meta().map(|meta| meta.kind)
    }

    /// LSN of a statement; 0 until committed
    pub fn lsn(&self) -> Option<i64> {
        self.statement_meta()
            .map(|meta| meta.lsn.load(Ordering::Acquire))
    }

    /// Stamp the commit LSN. No effect on plain tuples.
    pub fn set_lsn(&self, lsn: i64) {
        debug_assert!(self.statement_meta().is_some(), "set_lsn on a plain tuple");
        if let Some(meta) = self.statement_meta() {
            meta.lsn.store(lsn, Ordering::Release);
        }
    }

    /// How many upserts were squashed into this one
    pub fn n_upserts(&self) -> u8 {
        self.statement_meta()
            .map_or(0, |meta| meta.n_upserts.load(Ordering::Acquire))
    }

    pub fn set_n_upserts(&self, n: u8) {
        if let Some(meta) = self.statement_meta() {
            meta.n_upserts.store(n, Ordering::Release);
        }
    }

    /// Record part of an upsert; the whole record for other tuples
    pub fn upsert_data(&self) -> &[u8] {
        self.data()
    }

    /// Operations stored after the record; empty unless this is an upsert
    pub fn upsert_ops(&self) -> &[u8] {
        &self.payload()[self.data().len()..]
    }
}

impl StorageContext {
    /// REPLACE statement holding `data`
    pub fn new_replace(&self, format_id: FormatId, data: &[u8]) -> TupleResult<Tuple> {
        let format = self.lookup_format(format_id)?;
        validate(&format, data)?;
        TupleBuilder {
            format,
            record: &[data],
            ops: &[],
            field_map: true,
            stmt: Some(StatementType::Replace),
            charge: Charge::Force,
        }
        .build(self)
    }

    /// UPSERT statement: `data` is the record inserted when the key is
    /// absent, `ops` one encoded array of update operations
    pub fn new_upsert(&self, format_id: FormatId, data: &[u8], ops: &[u8]) -> TupleResult<Tuple> {
        let format = self.lookup_format(format_id)?;
        validate(&format, data)?;
        check_record(ops)?;
        TupleBuilder {
            format,
            record: &[data],
            ops,
            field_map: true,
            stmt: Some(StatementType::Upsert),
            charge: Charge::Force,
        }
        .build(self)
    }

    /// SELECT key statement from `part_count` encoded values in `parts`
    /// (no array header). Bytes after the last part are ignored.
    pub fn new_select(&self, format_id: FormatId, parts: &[u8], part_count: u32) -> TupleResult<Tuple> {
        let format = self.lookup_format(format_id)?;
        let mut key_len = 0;
        for _ in 0..part_count {
            key_len += value_len(&parts[key_len..])?;
        }

        let mut header = Vec::with_capacity(5);
        encode_array_header(&mut header, part_count);
        TupleBuilder {
            format,
            record: &[header.as_slice(), &parts[..key_len]],
            ops: &[],
            field_map: false,
            stmt: Some(StatementType::Select),
            charge: Charge::Force,
        }
        .build(self)
    }

    /// DELETE statement keeping the indexed fields of `source` and nil in
    /// every other field of the format
    pub fn new_surrogate_delete(&self, format_id: FormatId, source: &Tuple) -> TupleResult<Tuple> {
        let format = self.lookup_format(format_id)?;
        let field_count = format.field_count();

        let mut pieces: Vec<&[u8]> = Vec::with_capacity(field_count as usize + 1);
        let mut header = Vec::with_capacity(5);
        encode_array_header(&mut header, field_count);
        pieces.push(header.as_slice());
        for fieldno in 0..field_count {
            if format.is_indexed(fieldno) {
                let field = source
                    .field(fieldno)
                    .ok_or_else(|| TupleError::field_missing(fieldno))?;
                pieces.push(field);
            } else {
                pieces.push(NIL);
            }
        }

        TupleBuilder {
            format,
            record: &pieces,
            ops: &[],
            field_map: true,
            stmt: Some(StatementType::Delete),
            charge: Charge::Force,
        }
        .build(self)
    }

    /// Statement of type `kind` with the fields of `key` placed at the
    /// field numbers `key_def` names, nil elsewhere
    pub fn new_surrogate_from_key(
        &self,
        format_id: FormatId,
        key: &[u8],
        key_def: &KeyDef,
        kind: StatementType,
    ) -> TupleResult<Tuple> {
        debug_assert!(kind != StatementType::Upsert, "an upsert cannot be a surrogate");
        let format = self.lookup_format(format_id)?;
        let field_count = format.field_count();

        let part_count = check_record(key)?;
        if part_count != key_def.part_count() {
            return Err(TupleError::field_count_mismatch(
                key_def.part_count(),
                part_count,
            ));
        }

        let mut fields: Vec<&[u8]> = vec![NIL; field_count as usize];
        let (_, mut rest) = decode_array_header(key)?;
        for part in key_def.parts() {
            let len = value_len(rest)?;
            let slot = fields
                .get_mut(part.fieldno as usize)
                .ok_or_else(|| TupleError::field_missing(part.fieldno))?;
            *slot = &rest[..len];
            rest = &rest[len..];
        }

        let mut header = Vec::with_capacity(5);
        encode_array_header(&mut header, field_count);
        let mut pieces: Vec<&[u8]> = Vec::with_capacity(field_count as usize + 1);
        pieces.push(header.as_slice());
        pieces.extend(fields);

        TupleBuilder {
            format,
            record: &pieces,
            ops: &[],
            field_map: true,
            stmt: Some(kind),
            charge: Charge::Force,
        }
        .build(self)
    }

    /// REPLACE with the record of `upsert`, operations dropped, LSN kept
    pub fn replace_from_upsert(&self, format_id: FormatId, upsert: &Tuple) -> TupleResult<Tuple> {
        debug_assert_eq!(upsert.statement_type(), Some(StatementType::Upsert));
        let format = self.lookup_format(format_id)?;
        let replace = TupleBuilder {
            format,
            record: &[upsert.upsert_data()],
            ops: &[],
            field_map: true,
            stmt: Some(StatementType::Replace),
            charge: Charge::Force,
        }
        .build(self)?;
        replace.set_lsn(upsert.lsn().unwrap_or(0));
        Ok(replace)
    }

    /// Copy of `stmt` under `format_id` with the same type, LSN and
    /// upsert counter
    pub fn dup_statement(&self, stmt: &Tuple, format_id: FormatId) -> TupleResult<Tuple> {
        let format = self.lookup_format(format_id)?;
        let kind = stmt.statement_type().unwrap_or(StatementType::Replace);
        let copy = TupleBuilder {
            format,
            record: &[stmt.data()],
            ops: stmt.upsert_ops(),
            field_map: kind != StatementType::Select,
            stmt: Some(kind),
            charge: Charge::Force,
        }
        .build(self)?;
        copy.set_lsn(stmt.lsn().unwrap_or(0));
        copy.set_n_upserts(stmt.n_upserts());
        Ok(copy)
    }

    /// Admit a REPLACE through the quota.
    ///
    /// The write waits while memory is at the hard limit. If it gives up,
    /// the charge is released and `TUPLE_QUOTA_TIMEOUT` is returned; the
    /// write can be retried.
    pub async fn write_statement(
        &self,
        format_id: FormatId,
        data: &[u8],
        cancel: Option<&CancelToken>,
    ) -> TupleResult<Tuple> {
        self.admit(format_id, data, &[], StatementType::Replace, cancel)
            .await
    }

    /// Admit an UPSERT through the quota, see [`write_statement`](Self::write_statement)
    pub async fn write_upsert(
        &self,
        format_id: FormatId,
        data: &[u8],
        ops: &[u8],
        cancel: Option<&CancelToken>,
    ) -> TupleResult<Tuple> {
        check_record(ops)?;
        self.admit(format_id, data, ops, StatementType::Upsert, cancel)
            .await
    }

    async fn admit(
        &self,
        format_id: FormatId,
        data: &[u8],
        ops: &[u8],
        kind: StatementType,
        cancel: Option<&CancelToken>,
    ) -> TupleResult<Tuple> {
        let format = self.lookup_format(format_id)?;
        validate(&format, data)?;

        let size = data.len() + ops.len();
        let admitted = match cancel {
            Some(token) => self.quota().consume_cancellable(size, token).await,
            None => self.quota().consume(size).await,
        };
        if let Err(err) = admitted {
            self.quota().release(size);
            return Err(err.into());
        }

        TupleBuilder {
            format,
            record: &[data],
            ops,
            field_map: true,
            stmt: Some(kind),
            charge: Charge::Prepaid,
        }
        .build(self)
        .map_err(|err| {
            self.quota().release(size);
            err
        })
    }
}
