//! OpenTelemetry observability configuration and initialization
//!
//! tern logs through the `tracing` crate everywhere. This module installs the
//! subscriber that decides where those events go:
//!
//! - **Logs**: a `tracing-subscriber` fmt layer, JSON by default
//! - **Traces**: spans exported over OTLP/gRPC via `tracing-opentelemetry`
//! - **Metrics**: a global OTLP meter provider used by `ServerMetrics` and
//!   `ClientMetrics`
//!
//! Nothing here is required. Libraries never call [`init_observability`];
//! applications call it once at startup, before building a server or client.
//!
//! # Usage Pattern
//!
//! ```rust,no_run
//! use tern_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("accounts-api")
//!         .with_endpoint("http://localhost:4317")
//!         .with_log_level("tern_server=debug,info");
//!
//!     tern_core::init_observability(config).expect("Failed to init observability");
//!
//!     // ... run your application ...
//!
//!     tern_core::shutdown_observability();
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_SERVICE_NAME`: default service name
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: collector endpoint
//! - `RUST_LOG`: log filter; takes precedence over `log_level`

use crate::error::{Error, Result};
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// How often the meter provider pushes metrics to the collector
const METRICS_EXPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Telemetry settings
///
/// Defaults come from the environment where a standard variable exists,
/// otherwise from the values listed on each field.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Reported as `service.name`; default `OTEL_SERVICE_NAME` or "tern"
    pub service_name: String,

    /// Reported as `service.version`; default is this crate's version
    pub service_version: String,

    /// OTLP/gRPC collector; default `OTEL_EXPORTER_OTLP_ENDPOINT` or
    /// `http://localhost:4317`
    pub otlp_endpoint: String,

    /// Export spans over OTLP
    pub enable_traces: bool,

    /// Export metrics over OTLP
    pub enable_metrics: bool,

    /// Write log events to stdout
    pub enable_logs: bool,

    /// Format log events as JSON lines rather than human-readable text
    pub json_logs: bool,

    /// Fraction of traces to sample, clamped to `0.0..=1.0`
    pub trace_sample_ratio: f64,

    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "tern".to_string()),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            enable_traces: true,
            enable_metrics: true,
            enable_logs: true,
            json_logs: true,
            trace_sample_ratio: 1.0,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl ObservabilityConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    pub fn with_logs(mut self, enable: bool) -> Self {
        self.enable_logs = enable;
        self
    }

    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    pub fn with_sample_ratio(mut self, ratio: f64) -> Self {
        self.trace_sample_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    fn resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Install the global subscriber, tracer provider and meter provider
///
/// # Errors
///
/// Returns `Error::Internal` if an exporter cannot be built, the log filter
/// does not parse, or a global subscriber is already installed.
pub fn init_observability(config: ObservabilityConfig) -> Result<()> {
    let tracer = if config.enable_traces {
        Some(init_tracer(&config)?)
    } else {
        None
    };

    if config.enable_metrics {
        init_metrics(&config)?;
    }

    init_tracing_subscriber(&config, tracer)?;

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        logs = config.enable_logs,
        "Observability initialized"
    );

    Ok(())
}

fn init_tracer(config: &ObservabilityConfig) -> Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()
        .map_err(|e| Error::Internal(format!("span exporter: {}", e)))?;

    let sampler = if config.trace_sample_ratio >= 1.0 {
        Sampler::AlwaysOn
    } else {
        Sampler::TraceIdRatioBased(config.trace_sample_ratio)
    };

    let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(sampler)
        .with_id_generator(RandomIdGenerator::default())
        .build();

    // The subscriber layer needs a tracer before the provider goes global
    let tracer = provider.tracer(config.service_name.clone());
    global::set_tracer_provider(provider);

    Ok(tracer)
}

fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()
        .map_err(|e| Error::Internal(format!("metric exporter: {}", e)))?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(METRICS_EXPORT_INTERVAL)
        .build();

    let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build();

    global::set_meter_provider(provider);
    Ok(())
}

fn init_tracing_subscriber(
    config: &ObservabilityConfig,
    tracer: Option<opentelemetry_sdk::trace::Tracer>,
) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| Error::Internal(format!("log filter: {}", e)))?;

    let fmt_layer = config.enable_logs.then(|| {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true);
        if config.json_logs {
            layer.json().boxed()
        } else {
            layer.boxed()
        }
    });

    let telemetry_layer = tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(telemetry_layer)
        .try_init()
        .map_err(|e| Error::Internal(format!("subscriber: {}", e)))
}

/// Flush and release telemetry resources
///
/// Providers flush on drop, so this only marks the boundary in the logs.
/// Safe to call more than once.
pub fn shutdown_observability() {
    tracing::info!("Observability shut down");
}
