//! Proxy factory and the traced stand-in type
//!
//! [`SpanAwareProxyFactory`] turns a target type into a [`TracedProxy`]: a
//! stand-in presenting the same [`Dispatch`] contract as the original while
//! routing every call through one bound [`InterceptionHandler`]. The factory
//! mirrors the three constructor surfaces - zero-argument, one-argument and
//! full argument list - and validates the requested constructor shape against
//! the target's descriptor before building anything.
//!
//! Only two error kinds escape to the caller, both at create time:
//! [`TracewrapError::UnsupportedType`] when the descriptor rejects the type,
//! and [`TracewrapError::ProxyCreation`] wrapping everything else (missing
//! constructor, shape mismatch, construction failure). Once a proxy exists,
//! nothing tracing-related can fail a call.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::descriptor::{describe_target, Describe, TargetDescriptor};
use crate::error::TracewrapError;
use crate::intercept::InterceptionHandler;
use crate::labels::LabelProviderRegistry;
use crate::span::{SpanBackend, SpanLifecycle};
use crate::target::{CallError, Construct, Dispatch};

/// A stand-in that is behaviorally identical to its target
///
/// Implements [`Dispatch`] itself, so callers use the proxy exactly as they
/// would the original. Exactly one handler is bound to the instance for its
/// whole lifetime; dropping the proxy needs no explicit teardown.
pub struct TracedProxy<T: Dispatch> {
    inner: T,
    handler: InterceptionHandler,
}

impl<T: Dispatch> TracedProxy<T> {
    /// Metadata for the proxied type
    pub fn descriptor(&self) -> &TargetDescriptor {
        self.handler.descriptor()
    }
}

impl<T: Dispatch> std::fmt::Debug for TracedProxy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracedProxy")
            .field("target", &self.handler.descriptor().type_name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T: Dispatch> Dispatch for TracedProxy<T> {
    async fn dispatch(&self, method: &str, args: Value) -> Result<Value, CallError> {
        self.handler
            .invoke(method, args, |args| self.inner.dispatch(method, args))
            .await
    }
}

/// Creates span-aware proxies wired to one tracing backend and one registry
#[derive(Debug, Clone)]
pub struct SpanAwareProxyFactory {
    spans: SpanLifecycle,
    labels: Arc<LabelProviderRegistry>,
}

impl SpanAwareProxyFactory {
    pub fn new(backend: Arc<dyn SpanBackend>, labels: Arc<LabelProviderRegistry>) -> Self {
        Self {
            spans: SpanLifecycle::new(backend),
            labels,
        }
    }

    /// Create a proxy using the target's zero-argument constructor
    pub fn create<T>(&self) -> Result<TracedProxy<T>, TracewrapError>
    where
        T: Dispatch + Describe + Construct + 'static,
    {
        self.create_with_args::<T>(&[], Vec::new())
    }

    /// Create a proxy using a one-parameter constructor
    pub fn create_with_arg<T>(&self, param_type: &str, arg: Value) -> Result<TracedProxy<T>, TracewrapError>
    where
        T: Dispatch + Describe + Construct + 'static,
    {
        self.create_with_args::<T>(&[param_type], vec![arg])
    }

    /// Create a proxy using an arbitrary constructor shape
    pub fn create_with_args<T>(
        &self,
        param_types: &[&str],
        args: Vec<Value>,
    ) -> Result<TracedProxy<T>, TracewrapError>
    where
        T: Dispatch + Describe + Construct + 'static,
    {
        if param_types.len() != args.len() {
            return Err(TracewrapError::proxy_creation(format!(
                "constructor shape mismatch: {} parameter types, {} arguments",
                param_types.len(),
                args.len()
            )));
        }

        let descriptor = describe_target::<T>()?;

        if !descriptor.has_constructor(param_types) {
            return Err(TracewrapError::proxy_creation(format!(
                "no constructor {}({}) declared",
                descriptor.type_name(),
                param_types.join(", ")
            )));
        }

        let inner = T::construct(&args).map_err(|error| {
            TracewrapError::proxy_creation(format!(
                "unable to construct '{}': {}",
                descriptor.type_name(),
                error
            ))
        })?;

        debug!(target_type = descriptor.type_name(), "created span-aware proxy");

        Ok(TracedProxy {
            inner,
            handler: InterceptionHandler::new(descriptor, self.spans.clone(), self.labels.clone()),
        })
    }
}
