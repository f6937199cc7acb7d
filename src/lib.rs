//! tuplebox - tuple storage and memory quota for an in-memory database engine
//!
//! Tuples are immutable MessagePack arrays bound to a shared format that
//! describes their fields. The pieces:
//!
//! - `codec`: MessagePack scanning and the few encoders storage needs
//! - `format`: key definitions, tuple formats and the format registry
//! - `tuple`: tuples, field access, key extraction and LSM statements
//! - `quota`: the memory budget writers are throttled against
//! - `context`: one storage instance tying the above together
//!
//! Nothing is global except the log level. Each `StorageContext` has its
//! own registry, quota and pools.

pub mod cli;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod format;
pub mod iteration;
pub mod observability;
pub mod quota;
pub mod tuple;

pub use config::{ConfigError, StorageConfig};
pub use context::{FormatPin, StorageContext};
pub use error::{BoxError, BoxResult, ErrorKind};
pub use format::{FieldType, FormatDef, FormatId, KeyDef, KeyPart};
pub use iteration::{Fields, KeyParts};
pub use quota::{CancelToken, Quota, QuotaListener};
pub use tuple::{StatementType, Tuple, TupleError, TupleIterator, WeakTuple};
