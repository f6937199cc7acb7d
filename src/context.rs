//! Storage context
//!
//! Owns everything tuples are accounted against: the format registry, the
//! memory quota, the iterator and statement pools, and the metrics. Cloning
//! a context is cheap and yields a handle to the same state; every tuple
//! keeps one so that its destructor can return what it took.

use std::sync::Arc;

use crate::config::StorageConfig;
use crate::format::{FormatDef, FormatId, FormatRegistry, FormatResult, TupleFormat};
use crate::observability::{log_event_with_fields, Event, Logger, MetricsRegistry};
use crate::quota::{NoopListener, Quota, QuotaListener};
use crate::tuple::{
    validate, Charge, IteratorPool, StatementPool, Tuple, TupleBuilder, TupleError,
    TupleIterator, TupleResult,
};

struct ContextShared {
    config: StorageConfig,
    formats: FormatRegistry,
    quota: Quota,
    iterators: IteratorPool,
    statements: StatementPool,
    metrics: Arc<MetricsRegistry>,
}

impl Drop for ContextShared {
    fn drop(&mut self) {
        let used = self.quota.used();
        if used != 0 {
            log_event_with_fields(Event::ContextLeak, &[("used", &used.to_string())]);
        }
    }
}

/// Handle to one isolated storage instance
#[derive(Clone)]
pub struct StorageContext {
    shared: Arc<ContextShared>,
}

impl StorageContext {
    pub fn new(config: &StorageConfig) -> Self {
        Self::with_listener(config, Arc::new(NoopListener))
    }

    /// Context whose quota reports transitions to `listener`
    pub fn with_listener(config: &StorageConfig, listener: Arc<dyn QuotaListener>) -> Self {
        let metrics = Arc::new(MetricsRegistry::new());
        let quota = Quota::with_listener(
            config.memory_limit_bytes,
            config.quota_timeout(),
            listener,
        )
        .with_metrics(Arc::clone(&metrics));

        log_event_with_fields(
            Event::ContextCreated,
            &[
                ("max_formats", &config.max_formats.to_string()),
                ("max_iterators", &config.max_iterators.to_string()),
                ("memory_limit_bytes", &config.memory_limit_bytes.to_string()),
            ],
        );

        Self {
            shared: Arc::new(ContextShared {
                config: config.clone(),
                formats: FormatRegistry::new(config.max_formats),
                quota,
                iterators: IteratorPool::with_capacity(config.max_iterators),
                statements: StatementPool::with_capacity(config.statement_pool_size),
                metrics,
            }),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.shared.config
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.shared.formats
    }

    pub fn quota(&self) -> &Quota {
        &self.shared.quota
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.shared.metrics
    }

    pub(crate) fn iterator_pool(&self) -> &IteratorPool {
        &self.shared.iterators
    }

    pub(crate) fn statement_pool(&self) -> &StatementPool {
        &self.shared.statements
    }

    /// Register `def` and hold a reference on the resulting format for as
    /// long as the returned pin lives
    pub fn pin_format(&self, def: &FormatDef) -> FormatResult<FormatPin> {
        let id = self.formats().register_format(def)?;
        self.formats().ref_format(id, 1)?;
        Ok(FormatPin {
            ctx: self.clone(),
            id,
        })
    }

    /// Descriptor of a live format
    pub fn lookup_format(&self, id: FormatId) -> TupleResult<Arc<TupleFormat>> {
        self.formats()
            .lookup(id)
            .map_err(|_| TupleError::unknown_format(id.value()))
    }

    /// Tuple over the default runtime format.
    ///
    /// The bytes are checked to be exactly one well-formed array and copied.
    /// The tuple is charged to the quota without throttling.
    pub fn new_tuple(&self, data: &[u8]) -> TupleResult<Tuple> {
        self.new_tuple_with_format(self.formats().default_runtime_format(), data)
    }

    /// Tuple validated against and bound to `format_id`
    pub fn new_tuple_with_format(&self, format_id: FormatId, data: &[u8]) -> TupleResult<Tuple> {
        let format = self.lookup_format(format_id)?;
        validate(&format, data)?;
        TupleBuilder {
            format,
            record: &[data],
            ops: &[],
            field_map: true,
            stmt: None,
            charge: Charge::Force,
        }
        .build(self)
    }

    /// Pooled iterator over the fields of `tuple`
    pub fn iterator(&self, tuple: &Tuple) -> TupleResult<TupleIterator> {
        TupleIterator::new(tuple)
    }
}

impl Default for StorageContext {
    fn default() -> Self {
        Self::new(&StorageConfig::default())
    }
}

impl std::fmt::Debug for StorageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageContext")
            .field("formats", &self.formats().format_count())
            .field("quota", &self.quota().info())
            .finish()
    }
}

/// Reference on a format held by a schema object such as an index.
///
/// The format cannot be retired while a pin exists.
#[derive(Debug)]
pub struct FormatPin {
    ctx: StorageContext,
    id: FormatId,
}

impl FormatPin {
    pub fn id(&self) -> FormatId {
        self.id
    }
}

impl Drop for FormatPin {
    fn drop(&mut self) {
        if let Err(err) = self.ctx.formats().ref_format(self.id, -1) {
            Logger::fatal(
                "FORMAT_UNPIN_FAILED",
                &[("error", &err.to_string()), ("format_id", &self.id.to_string())],
            );
        }
    }
}
