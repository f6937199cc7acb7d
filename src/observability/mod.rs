//! Observability subsystem for tuplebox
//!
//! This module provides:
//! - Structured logging (JSON lines)
//! - Operational metrics
//! - Typed lifecycle events
//!
//! # Principles
//!
//! 1. Observability is read-only: it never changes storage behavior
//! 2. No async or background threads
//! 3. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use tuplebox::observability::{log_event_with_fields, Event, Logger};
//!
//! log_event_with_fields(Event::QuotaThrottled, &[("used", "110")]);
//! Logger::trace("TUPLE_NEW", &[("bsize", "12")]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

#[cfg(test)]
pub(crate) use logger::capture;

/// Log a lifecycle event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        // Only verifies no panic
        log_event(Event::ContextCreated);
        log_event(Event::QuotaReleased);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::ConfigLoaded, &[("memory_limit_bytes", "1024")]);
    }
}
