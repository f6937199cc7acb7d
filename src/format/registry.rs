//! Format registry
//!
//! Ids are dense `u16` slots. A retired id goes onto a free list and is
//! handed out again before the slot vector grows.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::errors::{FormatError, FormatResult};
use super::types::{FormatDef, FormatId, FormatKind, FormatLayout, TupleFormat};
use crate::observability::{log_event_with_fields, Event, Logger};

#[derive(Debug)]
struct Entry {
    format: Arc<TupleFormat>,
    refs: u32,
}

#[derive(Debug, Default)]
struct RegistryState {
    slots: Vec<Option<Entry>>,
    by_layout: HashMap<FormatLayout, FormatId>,
    free_ids: Vec<u16>,
}

impl RegistryState {
    fn entry_mut(&mut self, id: FormatId) -> Option<&mut Entry> {
        self.slots
            .get_mut(id.value() as usize)
            .and_then(Option::as_mut)
    }
}

/// Process-wide (per storage context) table of tuple formats.
#[derive(Debug)]
pub struct FormatRegistry {
    state: RwLock<RegistryState>,
    max_formats: usize,
    runtime: FormatId,
}

impl FormatRegistry {
    /// Upper bound on the id space
    pub const MAX_FORMATS: usize = u16::MAX as usize;

    /// Create a registry holding at most `max_formats` live formats.
    ///
    /// The schema-less runtime format is created immediately and referenced
    /// by the registry itself.
    pub fn new(max_formats: usize) -> Self {
        let max_formats = max_formats.clamp(1, Self::MAX_FORMATS);
        let runtime = FormatId::new(0);
        let layout = FormatLayout {
            kind: FormatKind::Runtime,
            fields: Vec::new(),
            exact_field_count: None,
            field_map_size: 0,
        };

        let mut state = RegistryState::default();
        state.by_layout.insert(layout.clone(), runtime);
        state.slots.push(Some(Entry {
            format: Arc::new(TupleFormat::new(runtime, layout)),
            refs: 1,
        }));

        Self {
            state: RwLock::new(state),
            max_formats,
            runtime,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the id of a format equivalent to `def`, allocating one if
    /// none exists.
    pub fn register_format(&self, def: &FormatDef) -> FormatResult<FormatId> {
        let layout = FormatLayout::build(def)?;
        let mut state = self.write();

        if let Some(id) = state.by_layout.get(&layout) {
            return Ok(*id);
        }

        let raw_id = match state.free_ids.pop() {
            Some(id) => id,
            None if state.slots.len() < self.max_formats => {
                state.slots.push(None);
                (state.slots.len() - 1) as u16
            }
            None => {
                Logger::error(
                    "FORMAT_SPACE_EXHAUSTED",
                    &[("max_formats", &self.max_formats.to_string())],
                );
                return Err(FormatError::space_exhausted(self.max_formats));
            }
        };

        let id = FormatId::new(raw_id);
        let format = Arc::new(TupleFormat::new(id, layout.clone()));
        log_event_with_fields(
            Event::FormatRegistered,
            &[
                ("field_count", &format.field_count().to_string()),
                ("field_map_size", &format.field_map_size().to_string()),
                ("format_id", &id.to_string()),
                ("kind", format.kind().as_str()),
            ],
        );
        state.slots[raw_id as usize] = Some(Entry { format, refs: 0 });
        state.by_layout.insert(layout, id);
        Ok(id)
    }

    /// Adjusts the reference count of a format and returns the new count.
    ///
    /// A count that drops to zero retires the format. Dropping below zero
    /// or rising past `u32::MAX` is an invariant violation and panics.
    pub fn ref_format(&self, id: FormatId, delta: i32) -> FormatResult<u32> {
        let mut state = self.write();
        let entry = state
            .entry_mut(id)
            .ok_or_else(|| FormatError::unknown_format(id.value()))?;

        let refs = i64::from(entry.refs) + i64::from(delta);
        if refs < 0 {
            Logger::fatal(
                "FORMAT_REF_UNDERFLOW",
                &[
                    ("delta", &delta.to_string()),
                    ("format_id", &id.to_string()),
                    ("refs", &entry.refs.to_string()),
                ],
            );
            panic!("format {} reference count underflow", id);
        }
        let Ok(new_refs) = u32::try_from(refs) else {
            Logger::fatal(
                "FORMAT_REF_OVERFLOW",
                &[
                    ("delta", &delta.to_string()),
                    ("format_id", &id.to_string()),
                    ("refs", &entry.refs.to_string()),
                ],
            );
            panic!("format {} reference count overflow", id);
        };
        entry.refs = new_refs;

        if refs == 0 && delta < 0 {
            let layout = entry.format.layout().clone();
            state.slots[id.value() as usize] = None;
            state.by_layout.remove(&layout);
            state.free_ids.push(id.value());
            log_event_with_fields(Event::FormatRetired, &[("format_id", &id.to_string())]);
        }
        Ok(new_refs)
    }

    /// Returns the descriptor of a live format.
    pub fn lookup(&self, id: FormatId) -> FormatResult<Arc<TupleFormat>> {
        self.read()
            .slots
            .get(id.value() as usize)
            .and_then(Option::as_ref)
            .map(|entry| Arc::clone(&entry.format))
            .ok_or_else(|| FormatError::unknown_format(id.value()))
    }

    /// Current reference count of a live format
    pub fn refs(&self, id: FormatId) -> Option<u32> {
        self.read()
            .slots
            .get(id.value() as usize)
            .and_then(Option::as_ref)
            .map(|entry| entry.refs)
    }

    /// The schema-less format used for standalone tuples
    pub fn default_runtime_format(&self) -> FormatId {
        self.runtime
    }

    /// Number of live formats, including the runtime format
    pub fn format_count(&self) -> usize {
        self.read().slots.iter().filter(|s| s.is_some()).count()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new(Self::MAX_FORMATS)
    }
}
