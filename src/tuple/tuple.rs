//! Tuple handle and storage layout
//!
//! A tuple is one immutable record plus the field map of its format, kept
//! in a single buffer:
//!
//! ```text
//! [ slot 0 | slot 1 | ... ][ array header | field 0 | field 1 | ... ][ ops ]
//!  <--- data_offset ----->  <------------- bsize -------------------------->
//! ```
//!
//! Slots are little-endian `u32` offsets of indexed fields relative to the
//! start of the record. `u32::MAX` marks a field the map does not know.
//! Only upsert statements carry `ops`.
//!
//! `Tuple` is a shared handle. The last handle to drop releases the format
//! reference and the quota charge, in that order.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use super::errors::{TupleError, TupleResult};
use super::pool::alloc_exact;
use super::statement::StatementType;
use crate::codec::{decode_array_header, format_record, value_len};
use crate::context::StorageContext;
use crate::format::{FormatId, FormatKind, TupleFormat};
use crate::observability::{Logger, Severity};

/// Field map entry of a field whose offset is not recorded
pub const FIELD_MAP_SENTINEL: u32 = u32::MAX;

const SLOT_BYTES: usize = std::mem::size_of::<u32>();

/// Where the quota charge of a new tuple comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Charge {
    /// Charge now, never blocking
    Force,
    /// The caller already charged `bsize` bytes
    Prepaid,
}

/// Header fields only engine statements have
#[derive(Debug)]
pub(crate) struct StatementMeta {
    pub kind: StatementType,
    pub lsn: AtomicI64,
    pub n_upserts: AtomicU8,
}

pub(crate) struct TupleInner {
    ctx: StorageContext,
    format: Arc<TupleFormat>,
    buf: Vec<u8>,
    data_offset: usize,
    record_len: usize,
    map_slots: u32,
    stmt: Option<StatementMeta>,
}

impl TupleInner {
    fn bsize(&self) -> usize {
        self.buf.len() - self.data_offset
    }
}

impl Drop for TupleInner {
    fn drop(&mut self) {
        let bsize = self.bsize();
        let id = self.format.id();

        if let Err(err) = self.ctx.formats().ref_format(id, -1) {
            Logger::fatal(
                "TUPLE_FORMAT_UNREF_FAILED",
                &[("error", &err.to_string()), ("format_id", &id.to_string())],
            );
        }
        self.ctx.quota().release(bsize);
        self.ctx.metrics().record_tuple_destroyed();

        if self.format.kind() == FormatKind::Engine {
            self.ctx.statement_pool().give(std::mem::take(&mut self.buf));
        }
    }
}

/// Everything needed to lay out a new tuple
pub(crate) struct TupleBuilder<'a> {
    pub format: Arc<TupleFormat>,
    /// Concatenated, these form exactly one well-formed array
    pub record: &'a [&'a [u8]],
    pub ops: &'a [u8],
    pub field_map: bool,
    pub stmt: Option<StatementType>,
    pub charge: Charge,
}

impl TupleBuilder<'_> {
    pub fn build(self, ctx: &StorageContext) -> TupleResult<Tuple> {
        let format = self.format;
        let map_slots = if self.field_map {
            format.field_map_size()
        } else {
            0
        };
        let map_bytes = map_slots as usize * SLOT_BYTES;
        let record_len: usize = self.record.iter().map(|piece| piece.len()).sum();
        let bsize = record_len + self.ops.len();
        let total = map_bytes + bsize;

        // Offsets must stay below the sentinel.
        if bsize >= FIELD_MAP_SENTINEL as usize {
            return Err(TupleError::out_of_memory(total, "tuple"));
        }

        let mut buf = match format.kind() {
            FormatKind::Engine => ctx.statement_pool().take(total)?,
            FormatKind::Runtime => alloc_exact(total, "tuple")?,
        };
        buf.resize(map_bytes, 0xff);
        for piece in self.record {
            buf.extend_from_slice(piece);
        }
        buf.extend_from_slice(self.ops);
        if map_slots > 0 {
            init_field_map(&mut buf, map_bytes, record_len, &format);
        }

        ctx.formats()
            .ref_format(format.id(), 1)
            .map_err(|_| TupleError::unknown_format(format.id().value()))?;
        if self.charge == Charge::Force {
            ctx.quota().force_consume(bsize);
        }
        ctx.metrics().record_tuple_created(bsize);

        if Logger::enabled(Severity::Trace) {
            Logger::trace(
                "TUPLE_NEW",
                &[
                    ("bsize", &bsize.to_string()),
                    ("format_id", &format.id().to_string()),
                    ("map_slots", &map_slots.to_string()),
                ],
            );
        }

        Ok(Tuple {
            inner: Arc::new(TupleInner {
                ctx: ctx.clone(),
                format,
                buf,
                data_offset: map_bytes,
                record_len,
                map_slots,
                stmt: self.stmt.map(|kind| StatementMeta {
                    kind,
                    lsn: AtomicI64::new(0),
                    n_upserts: AtomicU8::new(0),
                }),
            }),
        })
    }
}

/// Record the offset of every slotted field of the record behind the map
fn init_field_map(buf: &mut [u8], map_bytes: usize, record_len: usize, format: &TupleFormat) {
    let (map, payload) = buf.split_at_mut(map_bytes);
    let record = &payload[..record_len];
    let Ok((count, body)) = decode_array_header(record) else {
        debug_assert!(false, "field map over a malformed record");
        return;
    };

    let mut pos = record.len() - body.len();
    for fieldno in 0..count.min(format.field_count()) {
        if let Some(slot) = format.offset_slot(fieldno) {
            let at = slot as usize * SLOT_BYTES;
            map[at..at + SLOT_BYTES].copy_from_slice(&(pos as u32).to_le_bytes());
        }
        match value_len(&record[pos..]) {
            Ok(len) => pos += len,
            Err(_) => {
                debug_assert!(false, "field map over a malformed record");
                return;
            }
        }
    }
}

/// Shared handle to one immutable record
#[derive(Clone)]
pub struct Tuple {
    inner: Arc<TupleInner>,
}

/// Non-owning handle; does not keep the tuple alive
#[derive(Clone)]
pub struct WeakTuple {
    inner: Weak<TupleInner>,
}

impl WeakTuple {
    /// `None` once every strong handle is gone
    pub fn upgrade(&self) -> Option<Tuple> {
        self.inner.upgrade().map(|inner| Tuple { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl Tuple {
    /// The record bytes: one encoded array
    pub fn data(&self) -> &[u8] {
        let start = self.inner.data_offset;
        &self.inner.buf[start..start + self.inner.record_len]
    }

    /// Everything after the field map, including upsert operations
    pub(crate) fn payload(&self) -> &[u8] {
        &self.inner.buf[self.inner.data_offset..]
    }

    /// Bytes charged to the quota for this tuple
    pub fn bsize(&self) -> usize {
        self.inner.bsize()
    }

    /// Size of the field map in front of the record
    pub fn data_offset(&self) -> usize {
        self.inner.data_offset
    }

    pub fn format_id(&self) -> FormatId {
        self.inner.format.id()
    }

    pub fn format(&self) -> &Arc<TupleFormat> {
        &self.inner.format
    }

    /// Number of live handles, iterators included
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn downgrade(&self) -> WeakTuple {
        WeakTuple {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether both handles point at the same tuple
    pub fn ptr_eq(a: &Tuple, b: &Tuple) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub(crate) fn context(&self) -> &StorageContext {
        &self.inner.ctx
    }

    pub(crate) fn statement_meta(&self) -> Option<&StatementMeta> {
        self.inner.stmt.as_ref()
    }

    pub fn field_count(&self) -> u32 {
        decode_array_header(self.data()).map_or(0, |(count, _)| count)
    }

    /// Encoded bytes of field `fieldno`, or `None` past the last field
    pub fn field(&self, fieldno: u32) -> Option<&[u8]> {
        let offset = self.field_offset(fieldno)?;
        let data = self.data();
        let len = value_len(&data[offset..]).ok()?;
        Some(&data[offset..offset + len])
    }

    fn map_entry(&self, slot: u32) -> Option<usize> {
        if slot >= self.inner.map_slots {
            return None;
        }
        let at = slot as usize * SLOT_BYTES;
        let raw = self.inner.buf.get(at..at + SLOT_BYTES)?;
        let offset = u32::from_le_bytes(raw.try_into().ok()?);
        (offset != FIELD_MAP_SENTINEL).then_some(offset as usize)
    }

    /// Recorded offset of `fieldno`, if the field map knows it
    fn known_offset(&self, fieldno: u32) -> Option<usize> {
        self.inner
            .format
            .offset_slot(fieldno)
            .and_then(|slot| self.map_entry(slot))
    }

    /// Offset of field `fieldno` within `data()`.
    ///
    /// Slotted fields are O(1). Others are found by skipping forward from
    /// the closest preceding field whose offset is known.
    pub(crate) fn field_offset(&self, fieldno: u32) -> Option<usize> {
        let data = self.data();
        let (count, body) = decode_array_header(data).ok()?;
        if fieldno >= count {
            return None;
        }
        let header_len = data.len() - body.len();
        if fieldno == 0 {
            return Some(header_len);
        }
        if let Some(offset) = self.known_offset(fieldno) {
            return Some(offset);
        }

        let (mut pos, mut current) = (1..fieldno)
            .rev()
            .find_map(|prior| self.known_offset(prior).map(|offset| (offset, prior)))
            .unwrap_or((header_len, 0));
        while current < fieldno {
            pos += value_len(&data[pos..]).ok()?;
            current += 1;
        }
        Some(pos)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.statement_meta() {
            Some(meta) => {
                write!(f, "{}({}", meta.kind, format_record(self.data()))?;
                if meta.kind == StatementType::Upsert {
                    write!(f, ", ops={}", format_record(self.upsert_ops()))?;
                }
                write!(f, ", lsn={})", meta.lsn.load(Ordering::Acquire))
            }
            None => write!(f, "{}", format_record(self.data())),
        }
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tuple")
            .field("format_id", &self.format_id())
            .field("bsize", &self.bsize())
            .field("refs", &self.ref_count())
            .field("data", &format_record(self.data()))
            .finish()
    }
}
