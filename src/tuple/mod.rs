//! Tuple store
//!
//! Reference-counted, format-tagged records with O(1) access to indexed
//! fields, key extraction and pooled field iterators.
//!
//! # Invariants
//!
//! - Record bytes never change after construction
//! - A tuple's quota charge equals its `bsize` and is released exactly once,
//!   after the last handle is gone
//! - Every live tuple holds one reference on its format

mod errors;
mod iterator;
mod key;
mod pool;
mod statement;
mod tuple;
mod validate;

pub use errors::{TupleError, TupleErrorCode, TupleResult};
pub use iterator::TupleIterator;
pub use key::extract_key_raw;
pub use pool::{IteratorPool, StatementPool};
pub use statement::{key_to_string, StatementType};
pub use tuple::{Tuple, WeakTuple, FIELD_MAP_SENTINEL};
pub use validate::validate;

pub(crate) use tuple::{Charge, TupleBuilder};
