//! Memory quota and write throttling
//!
//! The quota tracks the bytes of every live tuple. Writers on the async
//! path go through [`Quota::consume`], which may suspend them at the hard
//! limit; accounting paths that must never block use
//! [`Quota::force_consume`]. A memory-pressure monitor tunes the watermark
//! with [`Quota::update_watermark`] and receives transitions through a
//! [`QuotaListener`].

mod cancel;
mod errors;
mod listener;
mod quota;

pub use cancel::CancelToken;
pub use errors::{QuotaError, QuotaResult, TimeoutReason};
pub use listener::{NoopListener, QuotaListener};
pub use quota::{Quota, QuotaInfo};
