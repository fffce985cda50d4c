//! Target type metadata - which constructors exist, which methods are traced
//!
//! Rust has no runtime reflection, so targets describe themselves once through
//! the [`Describe`] trait instead of being scanned for annotations. The result
//! is a [`TargetDescriptor`]: an immutable registration table listing the
//! type's constructors, its methods, which of them are traced, and which named
//! label providers apply to each. The interception handler consults this table
//! on every call to decide whether to instrument.
//!
//! Descriptors are validated and cached by `TypeId` via [`describe_target`];
//! recomputing one is always safe, the cache is purely an optimization.
//!
//! # Quick Start
//!
//! ```rust
//! use tracewrap::{Describe, TargetDescriptor};
//!
//! struct Account;
//!
//! impl Describe for Account {
//!     fn describe() -> TargetDescriptor {
//!         TargetDescriptor::builder("Account")
//!             .constructor(&[])
//!             .constructor(&["i64"])
//!             .traced_method("withdraw", &["i64"], &["amount"])
//!             .method("balance", &[])
//!             .build()
//!     }
//! }
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::TracewrapError;

/// Uniquely names a method for metadata and registry lookup
///
/// The combination of declaring type, method name and parameter-type sequence.
/// Its `Display` form (`Type.method`) is also the span name used when the
/// method is traced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodIdentity {
    type_name: String,
    method: String,
    param_types: Vec<String>,
}

impl MethodIdentity {
    /// Create a method identity from its three components
    pub fn new(
        type_name: impl Into<String>,
        method: impl Into<String>,
        param_types: &[&str],
    ) -> Self {
        Self {
            type_name: type_name.into(),
            method: method.into(),
            param_types: param_types.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn param_types(&self) -> &[String] {
        &self.param_types
    }

    /// The span name derived from this identity
    pub fn span_name(&self) -> String {
        format!("{}.{}", self.type_name, self.method)
    }
}

impl fmt::Display for MethodIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.method)
    }
}

/// One method entry in a target descriptor
#[derive(Debug, Clone)]
pub struct MethodSpec {
    name: String,
    param_types: Vec<String>,
    traced: bool,
    label_providers: Vec<String>,
}

impl MethodSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_types(&self) -> &[String] {
        &self.param_types
    }

    /// Whether calls to this method open a span
    pub fn is_traced(&self) -> bool {
        self.traced
    }

    /// Names of the label providers registered for this method
    pub fn label_providers(&self) -> &[String] {
        &self.label_providers
    }

    /// Build the full identity of this method on the given declaring type
    pub fn identity(&self, type_name: &str) -> MethodIdentity {
        MethodIdentity {
            type_name: type_name.to_string(),
            method: self.name.clone(),
            param_types: self.param_types.clone(),
        }
    }
}

/// One constructor entry in a target descriptor
#[derive(Debug, Clone)]
pub struct ConstructorSpec {
    param_types: Vec<String>,
}

impl ConstructorSpec {
    pub fn param_types(&self) -> &[String] {
        &self.param_types
    }
}

/// Immutable metadata about a proxyable target type
///
/// Built once per type via [`Describe::describe`], then treated as read-only
/// configuration. Never mutated by the proxying core.
#[derive(Debug, Clone)]
pub struct TargetDescriptor {
    type_name: String,
    sealed: bool,
    constructors: Vec<ConstructorSpec>,
    methods: HashMap<String, MethodSpec>,
}

impl TargetDescriptor {
    /// Start building a descriptor for the named type
    pub fn builder(type_name: impl Into<String>) -> TargetDescriptorBuilder {
        TargetDescriptorBuilder {
            type_name: type_name.into(),
            sealed: false,
            constructors: Vec::new(),
            methods: HashMap::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Whether the type opted out of proxying entirely
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn constructors(&self) -> &[ConstructorSpec] {
        &self.constructors
    }

    /// Check for a constructor with exactly this parameter-type sequence
    pub fn has_constructor(&self, param_types: &[&str]) -> bool {
        self.constructors
            .iter()
            .any(|c| c.param_types.iter().map(String::as_str).eq(param_types.iter().copied()))
    }

    /// Look up a method entry by name
    pub fn method(&self, name: &str) -> Option<&MethodSpec> {
        self.methods.get(name)
    }

    /// Answer "is this method traced?" - unknown methods are not
    pub fn is_traced(&self, method: &str) -> bool {
        self.methods.get(method).map(MethodSpec::is_traced).unwrap_or(false)
    }
}

/// Builder for [`TargetDescriptor`]
#[derive(Debug)]
pub struct TargetDescriptorBuilder {
    type_name: String,
    sealed: bool,
    constructors: Vec<ConstructorSpec>,
    methods: HashMap<String, MethodSpec>,
}

impl TargetDescriptorBuilder {
    /// Declare a constructor by its parameter-type names (empty for zero-arg)
    pub fn constructor(mut self, param_types: &[&str]) -> Self {
        self.constructors.push(ConstructorSpec {
            param_types: param_types.iter().map(|p| p.to_string()).collect(),
        });
        self
    }

    /// Declare a non-traced method - calls forward with zero overhead
    pub fn method(mut self, name: &str, param_types: &[&str]) -> Self {
        self.methods.insert(
            name.to_string(),
            MethodSpec {
                name: name.to_string(),
                param_types: param_types.iter().map(|p| p.to_string()).collect(),
                traced: false,
                label_providers: Vec::new(),
            },
        );
        self
    }

    /// Declare a traced method with its associated label-provider names
    pub fn traced_method(mut self, name: &str, param_types: &[&str], label_providers: &[&str]) -> Self {
        self.methods.insert(
            name.to_string(),
            MethodSpec {
                name: name.to_string(),
                param_types: param_types.iter().map(|p| p.to_string()).collect(),
                traced: true,
                label_providers: label_providers.iter().map(|l| l.to_string()).collect(),
            },
        );
        self
    }

    /// Mark the type as non-proxyable; `describe_target` will reject it
    pub fn sealed(mut self) -> Self {
        self.sealed = true;
        self
    }

    pub fn build(self) -> TargetDescriptor {
        TargetDescriptor {
            type_name: self.type_name,
            sealed: self.sealed,
            constructors: self.constructors,
            methods: self.methods,
        }
    }
}

/// Per-type self-description, the explicit replacement for annotation scanning
pub trait Describe {
    /// Produce the registration table for this type
    fn describe() -> TargetDescriptor;
}

static DESCRIPTOR_CACHE: Lazy<RwLock<HashMap<TypeId, Arc<TargetDescriptor>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Validate and cache the descriptor for `T`
///
/// Fails with [`TracewrapError::UnsupportedType`] if the type is sealed or
/// declares no constructor at all. Concurrent callers may race to compute the
/// same descriptor; the first insert wins and later results are discarded,
/// which is safe because `describe` is pure.
pub fn describe_target<T: Describe + 'static>() -> Result<Arc<TargetDescriptor>, TracewrapError> {
    let key = TypeId::of::<T>();

    {
        let cache = DESCRIPTOR_CACHE.read().unwrap_or_else(|e| e.into_inner());
        if let Some(descriptor) = cache.get(&key) {
            return Ok(Arc::clone(descriptor));
        }
    }

    let descriptor = T::describe();
    if descriptor.is_sealed() {
        return Err(TracewrapError::unsupported_type(format!(
            "type '{}' is sealed and cannot be proxied",
            descriptor.type_name()
        )));
    }
    if descriptor.constructors().is_empty() {
        return Err(TracewrapError::unsupported_type(format!(
            "type '{}' declares no constructor",
            descriptor.type_name()
        )));
    }

    let mut cache = DESCRIPTOR_CACHE.write().unwrap_or_else(|e| e.into_inner());
    let entry = cache.entry(key).or_insert_with(|| Arc::new(descriptor));
    Ok(Arc::clone(entry))
}
