//! Observability events for tuplebox
//!
//! Events are explicit and typed. Per-tuple activity is not an event; it is
//! logged at TRACE level where needed.

use std::fmt;

use super::logger::Severity;

/// Observable events in tuplebox
///
/// These events cover:
/// - Context lifecycle and configuration
/// - Format registration and retirement
/// - Quota state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Storage context created
    ContextCreated,
    /// Storage context dropped with memory still charged
    ContextLeak,

    // Configuration
    /// Configuration loaded
    ConfigLoaded,

    // Formats
    /// New format allocated
    FormatRegistered,
    /// Format retired after its last reference
    FormatRetired,

    // Quota
    /// Usage crossed the watermark, reclamation requested
    QuotaWatermarkExceeded,
    /// Watermark recomputed
    QuotaWatermarkUpdated,
    /// Writer suspended at the hard limit
    QuotaThrottled,
    /// Writer gave up waiting
    QuotaTimeout,
    /// Usage dropped back under the limit with writers waiting
    QuotaReleased,
    /// Release larger than current usage (FATAL)
    QuotaUnderflow,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            // Lifecycle
            Event::ContextCreated => "CONTEXT_CREATED",
            Event::ContextLeak => "CONTEXT_LEAK",

            // Configuration
            Event::ConfigLoaded => "CONFIG_LOADED",

            // Formats
            Event::FormatRegistered => "FORMAT_REGISTERED",
            Event::FormatRetired => "FORMAT_RETIRED",

            // Quota
            Event::QuotaWatermarkExceeded => "QUOTA_WATERMARK_EXCEEDED",
            Event::QuotaWatermarkUpdated => "QUOTA_WATERMARK_UPDATED",
            Event::QuotaThrottled => "QUOTA_THROTTLED",
            Event::QuotaTimeout => "QUOTA_TIMEOUT",
            Event::QuotaReleased => "QUOTA_RELEASED",
            Event::QuotaUnderflow => "QUOTA_UNDERFLOW",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::QuotaUnderflow => Severity::Fatal,
            Event::ContextLeak | Event::QuotaTimeout => Severity::Warn,
            Event::QuotaWatermarkUpdated | Event::QuotaReleased => Severity::Trace,
            _ => Severity::Info,
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::ContextCreated,
            Event::ContextLeak,
            Event::ConfigLoaded,
            Event::FormatRegistered,
            Event::FormatRetired,
            Event::QuotaWatermarkExceeded,
            Event::QuotaWatermarkUpdated,
            Event::QuotaThrottled,
            Event::QuotaTimeout,
            Event::QuotaReleased,
            Event::QuotaUnderflow,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_fatal_events() {
        assert!(Event::QuotaUnderflow.is_fatal());
        assert!(!Event::QuotaTimeout.is_fatal());
        assert!(!Event::FormatRegistered.is_fatal());
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::QuotaThrottled), "QUOTA_THROTTLED");
    }
}
