//! Span lifecycle management over a pluggable tracing backend
//!
//! The interception handler never talks to a tracing backend directly. It
//! drives [`SpanLifecycle`], which wraps an `Arc<dyn SpanBackend>` and
//! enforces the failure policy: any error raised by the backend is logged and
//! swallowed here, so backend trouble can never mask or replace the real
//! method's outcome. A failed `start` simply means the call proceeds
//! untraced.
//!
//! Two backends ship with the crate:
//!
//! - [`otel::OtelSpanBackend`] - drives the OpenTelemetry global tracer,
//!   parenting each span to the ambient trace context
//! - [`memory::InMemorySpanBackend`] - records spans in memory for tests and
//!   local inspection

pub mod memory;
pub mod otel;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

/// Opaque handle to one open span, valid until `end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

impl SpanId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "span-{}", self.0)
    }
}

/// Errors a tracing backend may raise; absorbed by [`SpanLifecycle`]
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The backend could not accept the operation
    #[error("tracing backend unavailable: {message}")]
    Unavailable { message: String },

    /// The handle does not refer to a span this backend knows about
    #[error("unknown span handle {0}")]
    UnknownSpan(SpanId),

    /// The span was already closed; spans close exactly once
    #[error("span {0} already closed")]
    AlreadyClosed(SpanId),
}

impl BackendError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// The narrow outbound contract to a tracing backend
///
/// `set_label` on an already-closed handle is a no-op by contract
/// (defensive; it should not occur if the lifecycle invariants hold).
#[cfg_attr(test, mockall::automock)]
pub trait SpanBackend: Send + Sync {
    /// Begin a new span parented to the ambient trace context
    fn start(&self, name: &str) -> Result<SpanId, BackendError>;

    /// Attach or overwrite one label on an open span
    fn set_label(&self, span: SpanId, key: &str, value: &str) -> Result<(), BackendError>;

    /// Mark the span as failed and record error details before closing
    fn record_error(&self, span: SpanId, message: &str) -> Result<(), BackendError>;

    /// Close the span, making it visible to the export pipeline
    fn end(&self, span: SpanId) -> Result<(), BackendError>;
}

/// Infallible span driver wrapping a backend handle
///
/// Every operation absorbs backend errors: they are logged via `tracing` and
/// never propagated to the intercepted call.
#[derive(Clone)]
pub struct SpanLifecycle {
    backend: Arc<dyn SpanBackend>,
}

impl fmt::Debug for SpanLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanLifecycle").finish_non_exhaustive()
    }
}

impl SpanLifecycle {
    pub fn new(backend: Arc<dyn SpanBackend>) -> Self {
        Self { backend }
    }

    /// Open a span; `None` means the backend refused and the call proceeds untraced
    pub fn start(&self, name: &str) -> Option<SpanId> {
        match self.backend.start(name) {
            Ok(span) => Some(span),
            Err(error) => {
                warn!(span_name = name, %error, "failed to start span; call proceeds untraced");
                None
            }
        }
    }

    /// Attach or overwrite one label
    pub fn set_label(&self, span: SpanId, key: &str, value: &str) {
        if let Err(error) = self.backend.set_label(span, key, value) {
            warn!(%span, key, %error, "failed to attach span label");
        }
    }

    /// Record error details on the span before closing it
    pub fn record_error(&self, span: SpanId, message: &str) {
        if let Err(error) = self.backend.record_error(span, message) {
            warn!(%span, %error, "failed to record error on span");
        }
    }

    /// Close the span
    pub fn end(&self, span: SpanId) {
        if let Err(error) = self.backend.end(span) {
            warn!(%span, %error, "failed to end span");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_start_yields_no_handle() {
        let mut backend = MockSpanBackend::new();
        backend
            .expect_start()
            .returning(|_| Err(BackendError::unavailable("exporter down")));

        let lifecycle = SpanLifecycle::new(Arc::new(backend));
        assert!(lifecycle.start("Account.withdraw").is_none());
    }

    #[test]
    fn test_backend_errors_are_absorbed() {
        let mut backend = MockSpanBackend::new();
        backend.expect_start().returning(|_| Ok(SpanId::new(1)));
        backend
            .expect_set_label()
            .returning(|_, _, _| Err(BackendError::unavailable("label rejected")));
        backend
            .expect_record_error()
            .returning(|_, _| Err(BackendError::UnknownSpan(SpanId::new(1))));
        backend
            .expect_end()
            .returning(|_| Err(BackendError::AlreadyClosed(SpanId::new(1))));

        let lifecycle = SpanLifecycle::new(Arc::new(backend));
        let span = lifecycle.start("Account.withdraw").unwrap();

        // None of these may panic or propagate anything.
        lifecycle.set_label(span, "amount", "50");
        lifecycle.record_error(span, "insufficient funds");
        lifecycle.end(span);
    }

    #[test]
    fn test_span_id_display() {
        assert_eq!(SpanId::new(7).to_string(), "span-7");
        assert_eq!(SpanId::new(7).raw(), 7);
    }
}
