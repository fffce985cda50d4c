//! OpenTelemetry bootstrap and tracing-subscriber wiring
//!
//! The proxying core never talks to an exporter; it only drives the
//! [`crate::span::SpanBackend`] contract. This module wires that contract to
//! a real pipeline: [`Telemetry::init`] builds an SDK tracer provider with
//! OTLP and/or console span processors and installs it globally, after which
//! [`Telemetry::span_backend`] hands out an [`OtelSpanBackend`] for the proxy
//! factory.
//!
//! # Quick Start
//!
//! ```no_run
//! use tracewrap::telemetry::{Telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TelemetryConfig::default()
//!         .enabled(true)
//!         .with_otlp_endpoint("http://localhost:4317")
//!         .with_service_name("billing-service");
//!
//!     let telemetry = Telemetry::init(config)?.expect("telemetry enabled");
//!     let backend = std::sync::Arc::new(telemetry.span_backend());
//!     // wire `backend` into a SpanAwareProxyFactory...
//!     # let _ = backend;
//!     telemetry.shutdown();
//!     Ok(())
//! }
//! ```

use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{trace::TracerProvider, Resource};
use tracing::info;

use crate::span::otel::OtelSpanBackend;
use crate::TracewrapError;

/// Configuration for the telemetry pipeline
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Whether telemetry is enabled at all
    pub enabled: bool,
    /// OTLP endpoint for production span export
    pub otlp_endpoint: Option<String>,
    /// Whether to export spans to the console for development
    pub console_export: bool,
    /// Service name for telemetry identification
    pub service_name: String,
    /// Service version for telemetry identification
    pub service_version: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: None,
            console_export: false,
            service_name: "tracewrap".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Enable or disable the pipeline
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set an explicit OTLP endpoint
    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    /// Enable console export for local debugging
    pub fn with_console_export(mut self) -> Self {
        self.console_export = true;
        self
    }

    /// Set the service name
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Set the service version
    pub fn with_service_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }
}

/// Handle to an initialized telemetry pipeline
#[derive(Debug)]
pub struct Telemetry {
    config: TelemetryConfig,
}

impl Telemetry {
    /// Initialize OpenTelemetry from the configuration
    ///
    /// Returns `Ok(None)` when telemetry is disabled; fails with
    /// [`TracewrapError::Configuration`] when the exporter cannot be built.
    pub fn init(config: TelemetryConfig) -> Result<Option<Self>, TracewrapError> {
        if !config.enabled {
            info!("telemetry disabled, skipping OpenTelemetry initialization");
            return Ok(None);
        }

        let resource = Resource::new(vec![
            KeyValue::new("service.name", config.service_name.clone()),
            KeyValue::new("service.version", config.service_version.clone()),
        ]);

        let mut builder = TracerProvider::builder()
            .with_config(opentelemetry_sdk::trace::Config::default().with_resource(resource));

        if let Some(ref endpoint) = config.otlp_endpoint {
            info!(endpoint, "configuring OTLP span exporter");
            let exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint.clone())
                .build_span_exporter()
                .map_err(|e| {
                    TracewrapError::configuration_error(format!(
                        "failed to build OTLP exporter: {}",
                        e
                    ))
                })?;
            let processor = opentelemetry_sdk::trace::BatchSpanProcessor::builder(
                exporter,
                opentelemetry_sdk::runtime::Tokio,
            )
            .build();
            builder = builder.with_span_processor(processor);
        }

        if config.console_export {
            info!("enabling console span exporter");
            let processor = opentelemetry_sdk::trace::BatchSpanProcessor::builder(
                opentelemetry_stdout::SpanExporter::default(),
                opentelemetry_sdk::runtime::Tokio,
            )
            .build();
            builder = builder.with_span_processor(processor);
        }

        global::set_tracer_provider(builder.build());
        info!("OpenTelemetry initialized");

        Ok(Some(Self { config }))
    }

    /// A span backend driving the installed pipeline
    pub fn span_backend(&self) -> OtelSpanBackend {
        OtelSpanBackend::new()
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Shut the tracer provider down gracefully, flushing pending spans
    pub fn shutdown(&self) {
        global::shutdown_tracer_provider();
        info!("OpenTelemetry tracer provider shut down");
    }
}

/// Install a `tracing` subscriber bridged to OpenTelemetry
///
/// Bridges the `tracing` macros used throughout this crate (and the host
/// application) into the installed tracer provider. Call after
/// [`Telemetry::init`].
pub fn init_tracing_subscriber() -> Result<(), TracewrapError> {
    use tracing_subscriber::layer::SubscriberExt;

    let telemetry_layer = tracing_opentelemetry::layer().with_location(true);

    let format_layer = tracing_subscriber::fmt::layer().with_target(true);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("tracewrap=debug,info"))
        .map_err(|e| {
            TracewrapError::configuration_error(format!("failed to create tracing filter: {}", e))
        })?;

    let subscriber = tracing_subscriber::registry()
        .with(filter_layer)
        .with(format_layer)
        .with(telemetry_layer);

    tracing::subscriber::set_global_default(subscriber).map_err(|e| {
        TracewrapError::configuration_error(format!(
            "failed to set global tracing subscriber: {}",
            e
        ))
    })?;

    Ok(())
}
