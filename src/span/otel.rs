//! OpenTelemetry span backend
//!
//! Adapts the narrow [`SpanBackend`] contract onto the OpenTelemetry global
//! tracer. Spans are parented to whatever ambient trace context is active on
//! the calling task (`Context::current()`); context propagation itself is the
//! surrounding application's responsibility.
//!
//! `BoxedSpan` handles cannot be cloned, so open spans live in a table keyed
//! by [`SpanId`] until `end` removes and closes them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use opentelemetry::global;
use opentelemetry::trace::{Span, SpanKind, Status, Tracer};
use opentelemetry::{Context, KeyValue};

use super::{BackendError, SpanBackend, SpanId};

/// Span backend driving the OpenTelemetry global tracer
pub struct OtelSpanBackend {
    tracer_name: String,
    next_id: AtomicU64,
    open: Mutex<HashMap<SpanId, global::BoxedSpan>>,
}

impl std::fmt::Debug for OtelSpanBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtelSpanBackend")
            .field("tracer_name", &self.tracer_name)
            .finish_non_exhaustive()
    }
}

impl Default for OtelSpanBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OtelSpanBackend {
    pub fn new() -> Self {
        Self::with_tracer_name("tracewrap")
    }

    /// Use a specific instrumentation-scope name instead of the default
    pub fn with_tracer_name(name: impl Into<String>) -> Self {
        Self {
            tracer_name: name.into(),
            next_id: AtomicU64::new(0),
            open: Mutex::new(HashMap::new()),
        }
    }

    fn tracer(&self) -> global::BoxedTracer {
        global::tracer(self.tracer_name.clone())
    }

    /// Classify an absent handle: ids at or below the counter were issued
    /// once, so their spans have been closed; anything else was never ours.
    fn closed_or_unknown(&self, span: SpanId) -> BackendError {
        if span.raw() > 0 && span.raw() <= self.next_id.load(Ordering::Relaxed) {
            BackendError::AlreadyClosed(span)
        } else {
            BackendError::UnknownSpan(span)
        }
    }
}

impl SpanBackend for OtelSpanBackend {
    fn start(&self, name: &str) -> Result<SpanId, BackendError> {
        let tracer = self.tracer();
        let span = tracer
            .span_builder(name.to_string())
            .with_kind(SpanKind::Internal)
            .start_with_context(&tracer, &Context::current());

        let id = SpanId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let mut open = self.open.lock().unwrap_or_else(|e| e.into_inner());
        open.insert(id, span);
        Ok(id)
    }

    fn set_label(&self, span: SpanId, key: &str, value: &str) -> Result<(), BackendError> {
        let mut open = self.open.lock().unwrap_or_else(|e| e.into_inner());
        // Closed handles are a contractual no-op.
        if let Some(active) = open.get_mut(&span) {
            active.set_attribute(KeyValue::new(key.to_string(), value.to_string()));
        }
        Ok(())
    }

    fn record_error(&self, span: SpanId, message: &str) -> Result<(), BackendError> {
        let mut open = self.open.lock().unwrap_or_else(|e| e.into_inner());
        match open.get_mut(&span) {
            Some(active) => {
                active.set_status(Status::error(message.to_string()));
                active.set_attribute(KeyValue::new("error.message", message.to_string()));
                active.set_attribute(KeyValue::new("error", true));
                Ok(())
            }
            None => Err(self.closed_or_unknown(span)),
        }
    }

    fn end(&self, span: SpanId) -> Result<(), BackendError> {
        let mut open = self.open.lock().unwrap_or_else(|e| e.into_inner());
        match open.remove(&span) {
            Some(mut active) => {
                active.end();
                Ok(())
            }
            None => Err(self.closed_or_unknown(span)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global tracer defaults to a no-op provider in tests; these cover
    // the handle table rather than export behavior.

    #[test]
    fn test_lifecycle_against_noop_tracer() {
        let backend = OtelSpanBackend::new();
        let span = backend.start("Account.withdraw").unwrap();
        backend.set_label(span, "amount", "50").unwrap();
        backend.record_error(span, "insufficient funds").unwrap();
        backend.end(span).unwrap();
    }

    #[test]
    fn test_end_twice_is_rejected() {
        let backend = OtelSpanBackend::new();
        let span = backend.start("Account.withdraw").unwrap();
        backend.end(span).unwrap();
        assert!(matches!(backend.end(span), Err(BackendError::AlreadyClosed(_))));
    }

    #[test]
    fn test_set_label_on_closed_handle_is_noop() {
        let backend = OtelSpanBackend::new();
        let span = backend.start("Account.withdraw").unwrap();
        backend.end(span).unwrap();
        assert!(backend.set_label(span, "late", "value").is_ok());
    }

    #[test]
    fn test_record_error_on_closed_handle_is_rejected() {
        let backend = OtelSpanBackend::new();
        let span = backend.start("Account.withdraw").unwrap();
        backend.end(span).unwrap();
        assert!(matches!(
            backend.record_error(span, "late"),
            Err(BackendError::AlreadyClosed(_))
        ));
    }

    #[test]
    fn test_closed_and_unknown_handles_are_distinguished() {
        let backend = OtelSpanBackend::new();
        let span = backend.start("Account.withdraw").unwrap();
        backend.end(span).unwrap();

        // An issued-then-ended handle reads as closed everywhere.
        assert!(matches!(backend.end(span), Err(BackendError::AlreadyClosed(_))));
        assert!(matches!(
            backend.record_error(span, "late"),
            Err(BackendError::AlreadyClosed(_))
        ));

        // A handle this backend never issued is unknown.
        let bogus = SpanId::new(99);
        assert!(matches!(backend.end(bogus), Err(BackendError::UnknownSpan(_))));
        assert!(matches!(
            backend.record_error(bogus, "late"),
            Err(BackendError::UnknownSpan(_))
        ));
    }

    #[test]
    fn test_span_ids_are_unique() {
        let backend = OtelSpanBackend::new();
        let first = backend.start("a").unwrap();
        let second = backend.start("b").unwrap();
        assert_ne!(first, second);
    }
}
