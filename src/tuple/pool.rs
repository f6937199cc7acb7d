//! Bounded pools backing iterators and engine statements
//!
//! - `IteratorPool` caps the number of live iterators; a full pool refuses
//!   new iterators instead of growing
//! - `StatementPool` recycles the buffers of destroyed engine statements

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::errors::{TupleError, TupleResult};

/// Allocate an empty buffer with room for exactly `len` bytes, reporting
/// allocator failure instead of aborting.
pub(crate) fn alloc_exact(len: usize, what: &str) -> TupleResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| TupleError::out_of_memory(len, what))?;
    Ok(buf)
}

/// Fixed-capacity slot counter for tuple iterators
#[derive(Debug)]
pub struct IteratorPool {
    capacity: usize,
    in_use: AtomicUsize,
}

impl IteratorPool {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            in_use: AtomicUsize::new(0),
        }
    }

    /// Take a slot. Returns false when every slot is in use.
    pub(crate) fn try_acquire(&self) -> bool {
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used < self.capacity).then_some(used + 1)
            })
            .is_ok()
    }

    pub(crate) fn release(&self) {
        let prev = self.in_use.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "iterator pool released more slots than acquired");
    }

    pub fn len(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remaining_capacity(&self) -> usize {
        self.capacity.saturating_sub(self.len())
    }
}

/// Free list of engine statement buffers
#[derive(Debug)]
pub struct StatementPool {
    free: Mutex<Vec<Vec<u8>>>,
    max_cached: usize,
}

impl StatementPool {
    pub fn with_capacity(max_cached: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_cached)),
            max_cached,
        }
    }

    /// An empty buffer with capacity for at least `len` bytes
    pub(crate) fn take(&self, len: usize) -> TupleResult<Vec<u8>> {
        {
            let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(idx) = free.iter().position(|buf| buf.capacity() >= len) {
                return Ok(free.swap_remove(idx));
            }
        }
        alloc_exact(len, "statement")
    }

    /// Return a buffer for reuse. Dropped if the pool is full.
    pub(crate) fn give(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.max_cached {
            free.push(buf);
        }
    }

    /// Buffers currently waiting for reuse
    pub fn cached(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
