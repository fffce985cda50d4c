//! In-memory span backend for tests and local inspection
//!
//! Records every span with its labels, status and error details, and enforces
//! the lifecycle state machine at the backend boundary: a span moves
//! `Open -> ClosedOk | ClosedError` exactly once, and a second `end` is an
//! error. Integration tests assert the handler's exit guarantee against the
//! recordings this backend keeps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{BackendError, SpanBackend, SpanId};
use crate::labels::LabelMap;

/// Lifecycle state of a recorded span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpanStatus {
    Open,
    ClosedOk,
    ClosedError,
}

/// One span as observed by the in-memory backend
#[derive(Debug, Clone, Serialize)]
pub struct RecordedSpan {
    pub name: String,
    pub labels: LabelMap,
    pub status: SpanStatus,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Span backend that records everything in memory, in start order
#[derive(Debug, Default)]
pub struct InMemorySpanBackend {
    next_id: AtomicU64,
    spans: Mutex<Vec<(SpanId, RecordedSpan)>>,
}

impl InMemorySpanBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded spans, open or closed, in start order
    pub fn spans(&self) -> Vec<RecordedSpan> {
        let spans = self.spans.lock().unwrap_or_else(|e| e.into_inner());
        spans.iter().map(|(_, span)| span.clone()).collect()
    }

    /// Only spans that have been closed
    pub fn finished_spans(&self) -> Vec<RecordedSpan> {
        self.spans()
            .into_iter()
            .filter(|span| span.status != SpanStatus::Open)
            .collect()
    }

    /// Number of spans still open; zero once all exit guarantees held
    pub fn open_count(&self) -> usize {
        let spans = self.spans.lock().unwrap_or_else(|e| e.into_inner());
        spans.iter().filter(|(_, span)| span.status == SpanStatus::Open).count()
    }
}

impl SpanBackend for InMemorySpanBackend {
    fn start(&self, name: &str) -> Result<SpanId, BackendError> {
        let id = SpanId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let mut spans = self.spans.lock().unwrap_or_else(|e| e.into_inner());
        spans.push((
            id,
            RecordedSpan {
                name: name.to_string(),
                labels: LabelMap::new(),
                status: SpanStatus::Open,
                error_message: None,
                started_at: Utc::now(),
                ended_at: None,
            },
        ));
        Ok(id)
    }

    fn set_label(&self, span: SpanId, key: &str, value: &str) -> Result<(), BackendError> {
        let mut spans = self.spans.lock().unwrap_or_else(|e| e.into_inner());
        match spans.iter_mut().find(|(id, _)| *id == span) {
            Some((_, recorded)) if recorded.status == SpanStatus::Open => {
                recorded.labels.insert(key.to_string(), value.to_string());
                Ok(())
            }
            // Closed handles are a contractual no-op.
            Some(_) => Ok(()),
            None => Err(BackendError::UnknownSpan(span)),
        }
    }

    fn record_error(&self, span: SpanId, message: &str) -> Result<(), BackendError> {
        let mut spans = self.spans.lock().unwrap_or_else(|e| e.into_inner());
        match spans.iter_mut().find(|(id, _)| *id == span) {
            Some((_, recorded)) if recorded.status == SpanStatus::Open => {
                recorded.error_message = Some(message.to_string());
                Ok(())
            }
            Some(_) => Err(BackendError::AlreadyClosed(span)),
            None => Err(BackendError::UnknownSpan(span)),
        }
    }

    fn end(&self, span: SpanId) -> Result<(), BackendError> {
        let mut spans = self.spans.lock().unwrap_or_else(|e| e.into_inner());
        match spans.iter_mut().find(|(id, _)| *id == span) {
            Some((_, recorded)) if recorded.status == SpanStatus::Open => {
                recorded.status = if recorded.error_message.is_some() {
                    SpanStatus::ClosedError
                } else {
                    SpanStatus::ClosedOk
                };
                recorded.ended_at = Some(Utc::now());
                Ok(())
            }
            Some(_) => Err(BackendError::AlreadyClosed(span)),
            None => Err(BackendError::UnknownSpan(span)),
        }
    }
}
