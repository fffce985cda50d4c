//! Error handling for the tracewrap library
//!
//! Only two kinds of failure are ever surfaced to callers, and both happen at
//! proxy-creation time:
//!
//! - [`TracewrapError::UnsupportedType`] - the target type cannot be proxied
//!   (sealed, or no usable constructor)
//! - [`TracewrapError::ProxyCreation`] - the stand-in could not be built
//!   (missing constructor, argument shape mismatch, construction failure)
//!
//! Everything that can go wrong *during* an intercepted call - a label
//! provider failing, the tracing backend being unavailable - is absorbed and
//! logged so it can never mask or replace the real method's outcome. Those
//! local failures have their own types ([`crate::labels::LabelProviderFailure`],
//! [`crate::span::BackendError`]) and never convert into `TracewrapError`.
//!
//! # Quick Start
//!
//! ```rust
//! use tracewrap::TracewrapError;
//!
//! # fn handle(error: TracewrapError) {
//! match error {
//!     TracewrapError::UnsupportedType { message } => {
//!         eprintln!("this type cannot be proxied: {}", message);
//!     }
//!     TracewrapError::ProxyCreation { message } => {
//!         eprintln!("proxy construction failed: {}", message);
//!     }
//!     other => eprintln!("unexpected error: {}", other),
//! }
//! # }
//! ```

use thiserror::Error;

/// Main error type for the tracewrap library
#[derive(Error, Debug, Clone)]
pub enum TracewrapError {
    /// The target type cannot be proxied (sealed, or not instantiable)
    #[error("unsupported target type: {message}")]
    UnsupportedType { message: String },

    /// Proxy synthesis or target construction failed
    #[error("unable to create proxy: {message}")]
    ProxyCreation { message: String },

    /// Telemetry bootstrap errors (exporter setup, subscriber installation)
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl TracewrapError {
    /// Create an UnsupportedType error
    pub fn unsupported_type(message: impl Into<String>) -> Self {
        Self::UnsupportedType {
            message: message.into(),
        }
    }

    /// Create a ProxyCreation error
    pub fn proxy_creation(message: impl Into<String>) -> Self {
        Self::ProxyCreation {
            message: message.into(),
        }
    }

    /// Create a Configuration error
    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Check if this error was raised while creating a proxy
    ///
    /// These are the only errors the proxying core lets escape to callers;
    /// per-call tracing failures are absorbed instead.
    pub fn is_create_error(&self) -> bool {
        matches!(
            self,
            TracewrapError::UnsupportedType { .. } | TracewrapError::ProxyCreation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = TracewrapError::unsupported_type("sealed type");
        assert!(matches!(error, TracewrapError::UnsupportedType { .. }));
        assert_eq!(error.to_string(), "unsupported target type: sealed type");
    }

    #[test]
    fn test_error_classification() {
        assert!(TracewrapError::unsupported_type("x").is_create_error());
        assert!(TracewrapError::proxy_creation("x").is_create_error());
        assert!(!TracewrapError::configuration_error("x").is_create_error());
    }

    #[test]
    fn test_error_display_messages() {
        let errors = vec![
            TracewrapError::unsupported_type("no constructor declared"),
            TracewrapError::proxy_creation("constructor rejected arguments"),
            TracewrapError::configuration_error("bad OTLP endpoint"),
        ];

        for error in errors {
            let display_str = error.to_string();
            assert!(!display_str.is_empty());
            assert!(display_str.contains(": "));
        }
    }
}
