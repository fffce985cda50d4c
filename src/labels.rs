//! Label providers and the per-method provider registry
//!
//! A [`LabelProvider`] is a named pure function extracting one string value
//! from a call's arguments (or, for result-phase providers, from arguments
//! plus result) for attachment to the span. The [`LabelProviderRegistry`]
//! maps a [`MethodIdentity`] to the ordered providers registered for it and
//! hands out a fresh, empty [`LabelMap`] per invocation, so no two concurrent
//! calls ever share mutable label state.
//!
//! Duplicate label names are resolved deterministically: providers run in
//! registration order and the last write for a given name wins.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::descriptor::MethodIdentity;

/// Mutable mapping of label name to label value, fresh per invocation
pub type LabelMap = HashMap<String, String>;

/// What a provider may observe when it runs
#[derive(Debug, Clone, Copy)]
pub struct LabelContext<'a> {
    /// The intercepted call's arguments
    pub args: &'a Value,
    /// The call's result; `None` before the real method has run
    pub result: Option<&'a Value>,
}

/// When a provider runs relative to the real method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelPhase {
    /// Before the call; sees only arguments
    Arguments,
    /// After a normal return; sees arguments and result
    Result,
}

/// A single provider failed; recovered locally, never surfaced to the caller
#[derive(Debug, Clone, Error)]
#[error("label provider '{provider}' failed: {message}")]
pub struct LabelProviderFailure {
    pub provider: String,
    pub message: String,
}

type ExtractFn = dyn Fn(&LabelContext<'_>) -> Result<String, String> + Send + Sync;

/// A named pure function from call context to one label value
#[derive(Clone)]
pub struct LabelProvider {
    name: String,
    phase: LabelPhase,
    extract: Arc<ExtractFn>,
}

impl fmt::Debug for LabelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabelProvider")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .finish()
    }
}

impl LabelProvider {
    /// A provider that depends only on the call's arguments
    pub fn from_arguments(
        name: impl Into<String>,
        extract: impl Fn(&Value) -> Result<String, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            phase: LabelPhase::Arguments,
            extract: Arc::new(move |ctx| extract(ctx.args)),
        }
    }

    /// A provider that depends on the call's result as well
    pub fn from_result(
        name: impl Into<String>,
        extract: impl Fn(&Value, &Value) -> Result<String, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            phase: LabelPhase::Result,
            extract: Arc::new(move |ctx| match ctx.result {
                Some(result) => extract(ctx.args, result),
                None => Err("no result available".to_string()),
            }),
        }
    }

    /// The label name this provider writes
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> LabelPhase {
        self.phase
    }

    /// Run the provider against the given call context
    pub fn extract(&self, ctx: &LabelContext<'_>) -> Result<String, LabelProviderFailure> {
        (self.extract)(ctx).map_err(|message| LabelProviderFailure {
            provider: self.name.clone(),
            message,
        })
    }
}

/// Maps method identities to their registered label providers
///
/// Built once at wiring time and shared read-only between proxies. An unknown
/// method identity simply yields no providers; there is no failure mode.
#[derive(Debug, Default)]
pub struct LabelProviderRegistry {
    providers: HashMap<MethodIdentity, Vec<LabelProvider>>,
}

impl LabelProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for the given method, preserving registration order
    pub fn register(mut self, identity: MethodIdentity, provider: LabelProvider) -> Self {
        self.providers.entry(identity).or_default().push(provider);
        self
    }

    /// Ordered providers for a method identity; empty if none registered
    pub fn providers_for(&self, identity: &MethodIdentity) -> &[LabelProvider] {
        self.providers.get(identity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// A fresh, empty label map for one invocation
    pub fn new_label_map(&self) -> LabelMap {
        LabelMap::new()
    }
}
