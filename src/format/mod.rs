//! Format registry
//!
//! A format describes which leading fields of a record are constrained, to
//! what type, and which of them get a slot in the per-tuple field map.
//! Formats are deduplicated structurally and reference counted: every live
//! tuple holds one reference to its format, and the registry itself holds
//! one on the default runtime format so it is never retired.

mod errors;
mod key_def;
mod registry;
mod types;

pub use errors::{FormatError, FormatErrorCode, FormatResult};
pub use key_def::{KeyDef, KeyPart};
pub use registry::FormatRegistry;
pub use types::{FieldFormat, FieldType, FormatDef, FormatId, FormatKind, TupleFormat};
