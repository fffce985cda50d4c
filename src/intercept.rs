//! Method interception - the per-call state machine
//!
//! One [`InterceptionHandler`] is bound to exactly one proxy instance for
//! that instance's lifetime. It holds the target's descriptor, a span
//! lifecycle driver and the label-provider registry, and keeps no per-call
//! state: every intercepted call gets its own span and its own label map, so
//! concurrent calls - on the same proxy or different ones - are fully
//! independent.
//!
//! For each call the handler:
//!
//! 1. checks descriptor metadata; non-traced methods forward directly with
//!    zero observable overhead
//! 2. opens a span named `Type.method`
//! 3. runs argument-phase label providers, each failure logged and skipped
//! 4. awaits the real method - the span stays open across suspension until
//!    the call's logical completion
//! 5. on normal return runs result-phase providers and closes the span; on
//!    error records it on the span, closes, and re-throws unchanged
//!
//! The span is closed exactly once on every exit path; label-provider
//! failures never prevent closure.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::descriptor::TargetDescriptor;
use crate::labels::{LabelContext, LabelMap, LabelPhase, LabelProvider, LabelProviderRegistry};
use crate::span::{SpanId, SpanLifecycle};
use crate::target::CallError;

/// Drives span lifecycle and label extraction around intercepted calls
#[derive(Debug, Clone)]
pub struct InterceptionHandler {
    descriptor: Arc<TargetDescriptor>,
    spans: SpanLifecycle,
    labels: Arc<LabelProviderRegistry>,
}

impl InterceptionHandler {
    pub fn new(
        descriptor: Arc<TargetDescriptor>,
        spans: SpanLifecycle,
        labels: Arc<LabelProviderRegistry>,
    ) -> Self {
        Self {
            descriptor,
            spans,
            labels,
        }
    }

    /// Metadata for the bound target type
    pub fn descriptor(&self) -> &TargetDescriptor {
        &self.descriptor
    }

    /// Intercept one call, forwarding to `call` for the real method body
    pub async fn invoke<F, Fut>(&self, method: &str, args: Value, call: F) -> Result<Value, CallError>
    where
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = Result<Value, CallError>>,
    {
        let spec = match self.descriptor.method(method) {
            Some(spec) if spec.is_traced() => spec,
            // Not traced: forward unmodified.
            _ => return call(args).await,
        };

        let identity = spec.identity(self.descriptor.type_name());
        let span = self.spans.start(&identity.span_name());
        let providers = self.labels.providers_for(&identity);

        // Providers may still need the arguments after the call consumed them.
        let label_args = if providers.is_empty() { Value::Null } else { args.clone() };
        // One fresh map per invocation; the backend holds the authoritative
        // labels, this map is the call-local staging area that keeps
        // duplicate names deterministic and never outlives the call.
        let mut label_map = self.labels.new_label_map();

        if let Some(span) = span {
            let ctx = LabelContext {
                args: &label_args,
                result: None,
            };
            self.apply_labels(span, providers, &ctx, LabelPhase::Arguments, &mut label_map);
        }

        match call(args).await {
            Ok(result) => {
                if let Some(span) = span {
                    let ctx = LabelContext {
                        args: &label_args,
                        result: Some(&result),
                    };
                    self.apply_labels(span, providers, &ctx, LabelPhase::Result, &mut label_map);
                    self.spans.end(span);
                }
                Ok(result)
            }
            Err(error) => {
                if let Some(span) = span {
                    self.spans.record_error(span, &error.to_string());
                    self.spans.end(span);
                }
                Err(error)
            }
        }
    }

    /// Run the providers of one phase; a failing provider contributes no label
    fn apply_labels(
        &self,
        span: SpanId,
        providers: &[LabelProvider],
        ctx: &LabelContext<'_>,
        phase: LabelPhase,
        label_map: &mut LabelMap,
    ) {
        for provider in providers.iter().filter(|p| p.phase() == phase) {
            match provider.extract(ctx) {
                Ok(value) => {
                    // Registration order makes duplicate names deterministic:
                    // the last write wins, in the map and on the span.
                    label_map.insert(provider.name().to_string(), value.clone());
                    self.spans.set_label(span, provider.name(), &value);
                }
                Err(failure) => {
                    warn!(%span, %failure, "label omitted");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{MethodIdentity, TargetDescriptor};
    use crate::labels::LabelProvider;
    use crate::span::memory::{InMemorySpanBackend, SpanStatus};
    use crate::span::{BackendError, MockSpanBackend, SpanBackend};
    use serde_json::json;

    fn account_descriptor() -> Arc<TargetDescriptor> {
        Arc::new(
            TargetDescriptor::builder("Account")
                .constructor(&[])
                .traced_method("withdraw", &["i64"], &["amount"])
                .method("balance", &[])
                .build(),
        )
    }

    fn withdraw_identity() -> MethodIdentity {
        MethodIdentity::new("Account", "withdraw", &["i64"])
    }

    fn handler_with(
        backend: Arc<dyn SpanBackend>,
        registry: LabelProviderRegistry,
    ) -> InterceptionHandler {
        InterceptionHandler::new(
            account_descriptor(),
            SpanLifecycle::new(backend),
            Arc::new(registry),
        )
    }

    #[test]
    fn test_non_traced_call_touches_no_backend() {
        // Any backend interaction would panic the unconfigured mock.
        let backend = MockSpanBackend::new();
        let handler = handler_with(Arc::new(backend), LabelProviderRegistry::new());

        let result = tokio_test::block_on(
            handler.invoke("balance", json!({}), |_| async { Ok(json!(100)) }),
        )
        .unwrap();
        assert_eq!(result, json!(100));
    }

    #[test]
    fn test_unknown_method_is_forwarded() {
        let backend = MockSpanBackend::new();
        let handler = handler_with(Arc::new(backend), LabelProviderRegistry::new());

        let error = tokio_test::block_on(handler.invoke("transfer", json!({}), |_| async {
            Err(CallError::unknown_method("Account", "transfer"))
        }))
        .unwrap_err();
        assert!(matches!(error, CallError::UnknownMethod { .. }));
    }

    #[tokio::test]
    async fn test_traced_call_opens_and_closes_one_span() {
        let backend = Arc::new(InMemorySpanBackend::new());
        let registry = LabelProviderRegistry::new().register(
            withdraw_identity(),
            LabelProvider::from_arguments("amount", |args| {
                args["amount"]
                    .as_i64()
                    .map(|v| v.to_string())
                    .ok_or_else(|| "amount missing".to_string())
            }),
        );
        let handler = handler_with(backend.clone(), registry);

        let result = handler
            .invoke("withdraw", json!({ "amount": 50 }), |_| async { Ok(json!(50)) })
            .await
            .unwrap();
        assert_eq!(result, json!(50));

        let finished = backend.finished_spans();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].name, "Account.withdraw");
        assert_eq!(finished[0].status, SpanStatus::ClosedOk);
        assert_eq!(finished[0].labels.get("amount"), Some(&"50".to_string()));
        assert_eq!(backend.open_count(), 0);
    }

    #[tokio::test]
    async fn test_error_path_records_and_closes_span() {
        let backend = Arc::new(InMemorySpanBackend::new());
        let handler = handler_with(backend.clone(), LabelProviderRegistry::new());

        let error = handler
            .invoke("withdraw", json!({ "amount": -1 }), |_| async {
                Err(CallError::invalid_arguments("withdraw", "negative amount"))
            })
            .await
            .unwrap_err();
        assert!(matches!(error, CallError::InvalidArguments { .. }));

        let finished = backend.finished_spans();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].status, SpanStatus::ClosedError);
        assert!(finished[0].error_message.as_deref().unwrap().contains("negative amount"));
        assert_eq!(backend.open_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_provider_skips_label_but_not_closure() {
        let backend = Arc::new(InMemorySpanBackend::new());
        let registry = LabelProviderRegistry::new()
            .register(
                withdraw_identity(),
                LabelProvider::from_arguments("broken", |_| Err("boom".to_string())),
            )
            .register(
                withdraw_identity(),
                LabelProvider::from_arguments("amount", |args| Ok(args["amount"].to_string())),
            );
        let handler = handler_with(backend.clone(), registry);

        let result = handler
            .invoke("withdraw", json!({ "amount": 50 }), |_| async { Ok(json!(50)) })
            .await
            .unwrap();
        assert_eq!(result, json!(50));

        let finished = backend.finished_spans();
        assert_eq!(finished[0].status, SpanStatus::ClosedOk);
        assert!(!finished[0].labels.contains_key("broken"));
        assert_eq!(finished[0].labels.get("amount"), Some(&"50".to_string()));
    }

    #[tokio::test]
    async fn test_result_phase_provider_sees_the_result() {
        let backend = Arc::new(InMemorySpanBackend::new());
        let registry = LabelProviderRegistry::new().register(
            withdraw_identity(),
            LabelProvider::from_result("remaining", |_args, result| Ok(result.to_string())),
        );
        let handler = handler_with(backend.clone(), registry);

        handler
            .invoke("withdraw", json!({ "amount": 50 }), |_| async { Ok(json!(50)) })
            .await
            .unwrap();

        let finished = backend.finished_spans();
        assert_eq!(finished[0].labels.get("remaining"), Some(&"50".to_string()));
    }

    #[tokio::test]
    async fn test_duplicate_label_names_last_registered_wins() {
        let backend = Arc::new(InMemorySpanBackend::new());
        let registry = LabelProviderRegistry::new()
            .register(
                withdraw_identity(),
                LabelProvider::from_arguments("amount", |_| Ok("first".to_string())),
            )
            .register(
                withdraw_identity(),
                LabelProvider::from_arguments("amount", |_| Ok("second".to_string())),
            );
        let handler = handler_with(backend.clone(), registry);

        handler
            .invoke("withdraw", json!({ "amount": 50 }), |_| async { Ok(json!(50)) })
            .await
            .unwrap();

        let finished = backend.finished_spans();
        assert_eq!(finished[0].labels.get("amount"), Some(&"second".to_string()));
    }

    #[tokio::test]
    async fn test_backend_refusing_start_leaves_call_untouched() {
        let mut backend = MockSpanBackend::new();
        backend
            .expect_start()
            .returning(|_| Err(BackendError::unavailable("exporter down")));

        let handler = handler_with(Arc::new(backend), LabelProviderRegistry::new());
        let result = handler
            .invoke("withdraw", json!({ "amount": 50 }), |_| async { Ok(json!(50)) })
            .await
            .unwrap();
        assert_eq!(result, json!(50));
    }
}
