//! The target contract - how a proxyable object exposes its methods
//!
//! With no runtime code generation available, a target presents its public
//! contract through a uniform dynamic-dispatch surface: the [`Dispatch`]
//! trait routes a method name plus JSON arguments to the real method body.
//! Both the concrete target and its stand-in implement `Dispatch`, so a
//! caller holding the proxy uses exactly the same surface as one holding the
//! original.
//!
//! [`Construct`] is the explicit constructor table: it builds an instance
//! from an ordered argument list, mirroring the descriptor's declared
//! constructor shapes.
//!
//! # Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use serde_json::{json, Value};
//! use tracewrap::{CallError, Construct, ConstructError, Dispatch};
//!
//! struct Account {
//!     balance: i64,
//! }
//!
//! impl Construct for Account {
//!     fn construct(args: &[Value]) -> Result<Self, ConstructError> {
//!         match args {
//!             [] => Ok(Self { balance: 100 }),
//!             [initial] => initial
//!                 .as_i64()
//!                 .map(|balance| Self { balance })
//!                 .ok_or_else(|| ConstructError::new("initial balance must be an integer")),
//!             _ => Err(ConstructError::new("too many constructor arguments")),
//!         }
//!     }
//! }
//!
//! #[async_trait]
//! impl Dispatch for Account {
//!     async fn dispatch(&self, method: &str, args: Value) -> Result<Value, CallError> {
//!         match method {
//!             "balance" => Ok(json!(self.balance)),
//!             "withdraw" => {
//!                 let amount = args["amount"]
//!                     .as_i64()
//!                     .ok_or_else(|| CallError::invalid_arguments("withdraw", "amount must be an integer"))?;
//!                 Ok(json!(self.balance - amount))
//!             }
//!             other => Err(CallError::unknown_method("Account", other)),
//!         }
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors produced while dispatching a call on a target
///
/// `Application` wraps whatever error the real method body raised; the
/// interception handler re-throws it untouched, so the proxy's caller
/// observes the identical error a direct call would have produced.
#[derive(Debug, Error)]
pub enum CallError {
    /// The target has no method by this name
    #[error("no method '{method}' on {target}")]
    UnknownMethod { target: String, method: String },

    /// The arguments did not match the method's expected shape
    #[error("invalid arguments for '{method}': {message}")]
    InvalidArguments { method: String, message: String },

    /// The real method body failed; carried through unmodified
    #[error(transparent)]
    Application(#[from] anyhow::Error),
}

impl CallError {
    /// Create an UnknownMethod error
    pub fn unknown_method(target: impl Into<String>, method: impl Into<String>) -> Self {
        Self::UnknownMethod {
            target: target.into(),
            method: method.into(),
        }
    }

    /// Create an InvalidArguments error
    pub fn invalid_arguments(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Wrap a business error raised by the real method body
    pub fn application<E: Into<anyhow::Error>>(error: E) -> Self {
        Self::Application(error.into())
    }

    /// Downcast an `Application` error to the concrete business error type
    pub fn application_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            Self::Application(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Target construction failed
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConstructError {
    message: String,
}

impl ConstructError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The uniform invocation surface shared by targets and their proxies
#[async_trait]
pub trait Dispatch: Send + Sync {
    /// Route a method name and its JSON arguments to the real method body
    async fn dispatch(&self, method: &str, args: Value) -> Result<Value, CallError>;
}

/// Explicit constructor table for a target type
pub trait Construct: Sized {
    /// Build an instance from an ordered constructor-argument list
    fn construct(args: &[Value]) -> Result<Self, ConstructError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("insufficient funds")]
    struct InsufficientFunds;

    #[test]
    fn test_call_error_display() {
        let error = CallError::unknown_method("Account", "transfer");
        assert_eq!(error.to_string(), "no method 'transfer' on Account");

        let error = CallError::invalid_arguments("withdraw", "amount must be an integer");
        assert_eq!(
            error.to_string(),
            "invalid arguments for 'withdraw': amount must be an integer"
        );
    }

    #[test]
    fn test_application_error_preserves_type_and_message() {
        let error = CallError::application(InsufficientFunds);
        assert_eq!(error.to_string(), "insufficient funds");
        assert!(error.application_ref::<InsufficientFunds>().is_some());
        assert!(error.application_ref::<std::io::Error>().is_none());
    }

    #[test]
    fn test_construct_error_message() {
        let error = ConstructError::new("too many constructor arguments");
        assert_eq!(error.to_string(), "too many constructor arguments");
    }
}
