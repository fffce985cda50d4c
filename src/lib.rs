//! Transparent span-aware proxies for service objects.
//!
//! Tracewrap gives you distributed-tracing instrumentation for objects that
//! live outside your framework's interception layer - objects you construct
//! by hand rather than obtain from dependency injection at a request
//! boundary. You ask the factory for a behaviorally-identical stand-in of a
//! target type; calling a traced method on the stand-in transparently opens a
//! trace span, runs the real method, attaches descriptive labels, and closes
//! the span on every exit path. The target's own code never mentions tracing.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use serde_json::{json, Value};
//! use tracewrap::{
//!     CallError, Construct, ConstructError, Describe, Dispatch, InMemorySpanBackend,
//!     LabelProvider, LabelProviderRegistry, MethodIdentity, SpanAwareProxyFactory,
//!     TargetDescriptor,
//! };
//!
//! struct Account {
//!     balance: i64,
//! }
//!
//! impl Describe for Account {
//!     fn describe() -> TargetDescriptor {
//!         TargetDescriptor::builder("Account")
//!             .constructor(&[])
//!             .traced_method("withdraw", &["i64"], &["amount"])
//!             .build()
//!     }
//! }
//!
//! impl Construct for Account {
//!     fn construct(_args: &[Value]) -> Result<Self, ConstructError> {
//!         Ok(Self { balance: 100 })
//!     }
//! }
//!
//! #[async_trait]
//! impl Dispatch for Account {
//!     async fn dispatch(&self, method: &str, args: Value) -> Result<Value, CallError> {
//!         match method {
//!             "withdraw" => {
//!                 let amount = args["amount"].as_i64().ok_or_else(|| {
//!                     CallError::invalid_arguments("withdraw", "amount must be an integer")
//!                 })?;
//!                 Ok(json!(self.balance - amount))
//!             }
//!             other => Err(CallError::unknown_method("Account", other)),
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = Arc::new(InMemorySpanBackend::new());
//!     let labels = LabelProviderRegistry::new().register(
//!         MethodIdentity::new("Account", "withdraw", &["i64"]),
//!         LabelProvider::from_arguments("amount", |args| {
//!             args["amount"]
//!                 .as_i64()
//!                 .map(|v| v.to_string())
//!                 .ok_or_else(|| "amount missing".to_string())
//!         }),
//!     );
//!
//!     let factory = SpanAwareProxyFactory::new(backend.clone(), Arc::new(labels));
//!     let account = factory.create::<Account>()?;
//!
//!     let remaining = account.dispatch("withdraw", json!({ "amount": 50 })).await?;
//!     assert_eq!(remaining, json!(50));
//!
//!     let spans = backend.finished_spans();
//!     assert_eq!(spans[0].name, "Account.withdraw");
//!     assert_eq!(spans[0].labels.get("amount"), Some(&"50".to_string()));
//!     Ok(())
//! }
//! ```
//!
//! In production, swap [`InMemorySpanBackend`] for the OpenTelemetry backend
//! wired by [`telemetry::Telemetry::init`].
//!
//! # Architecture Overview
//!
//! Five components cooperate, leaves first:
//!
//! - **[`descriptor::TargetDescriptor`]** - per-type registration table:
//!   constructors, methods, traced flags, label-provider names
//! - **[`labels::LabelProviderRegistry`]** - method identity to named
//!   label-extraction functions, plus a fresh label map per invocation
//! - **[`span::SpanLifecycle`]** - drives a pluggable [`span::SpanBackend`]
//!   and absorbs every backend failure so tracing can never break a call
//! - **[`intercept::InterceptionHandler`]** - the per-proxy state machine:
//!   decide, open span, label, invoke, close on every exit path
//! - **[`proxy::SpanAwareProxyFactory`]** - builds [`proxy::TracedProxy`]
//!   stand-ins and binds one fresh handler to each
//!
//! # Key Guarantees
//!
//! - Non-traced methods forward with zero observable overhead
//! - A span opened for a call is closed exactly once, on every exit path
//! - The real method's result or error always passes through unmodified;
//!   label-provider and backend failures are logged and absorbed
//! - Concurrent calls never share span or label state
//!
//! # Key Types
//!
//! - [`SpanAwareProxyFactory`] - the caller-facing surface
//! - [`TargetDescriptor`] / [`Describe`] - explicit type metadata
//! - [`LabelProvider`] / [`LabelProviderRegistry`] - label extraction
//! - [`SpanBackend`] - the narrow outbound tracing contract
//! - [`TracewrapError`] - the only errors this crate surfaces

pub mod descriptor;
pub mod error;
pub mod intercept;
pub mod labels;
pub mod proxy;
pub mod span;
pub mod target;
pub mod telemetry;

pub use descriptor::{
    describe_target, Describe, MethodIdentity, MethodSpec, TargetDescriptor,
};
pub use error::TracewrapError;
pub use intercept::InterceptionHandler;
pub use labels::{LabelMap, LabelPhase, LabelProvider, LabelProviderFailure, LabelProviderRegistry};
pub use proxy::{SpanAwareProxyFactory, TracedProxy};
pub use span::memory::InMemorySpanBackend;
pub use span::otel::OtelSpanBackend;
pub use span::{BackendError, SpanBackend, SpanId, SpanLifecycle};
pub use target::{CallError, Construct, ConstructError, Dispatch};
