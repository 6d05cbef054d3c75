//! Server metrics definitions
//!
//! OpenTelemetry instruments for monitoring a tern server. They are exported
//! through whatever meter provider is installed globally, normally the OTLP
//! provider set up by `tern_core::init_observability`.
//!
//! # Metrics Collected
//!
//! - **tern.server.requests.total**: requests processed, by method and outcome (counter)
//! - **tern.server.request.duration**: processing latency in seconds (histogram)
//! - **tern.server.errors.total**: failed requests, by error kind (counter)
//! - **tern.server.requests.active**: requests currently in flight (up/down counter)
//!
//! # Usage
//!
//! Metrics are recorded automatically when observability is enabled via
//! `ServerBuilder::with_observability()`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use tern_server::ServerMetrics;
//!
//! let metrics = ServerMetrics::new("accounts-api");
//! metrics.record_request("users.getUser", "success", 0.025);
//! metrics.record_error("NotFound");
//! ```

use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter, UpDownCounter},
    KeyValue,
};

/// Server metrics for monitoring
///
/// All instruments are prefixed with `tern.server.*`.
pub struct ServerMetrics {
    /// Total number of requests processed
    pub requests_total: Counter<u64>,
    /// Request processing duration in seconds
    pub request_duration: Histogram<f64>,
    /// Total number of failed requests
    pub errors_total: Counter<u64>,
    /// Requests currently being processed
    pub requests_active: UpDownCounter<i64>,
}

impl ServerMetrics {
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            requests_total: meter
                .u64_counter("tern.server.requests.total")
                .with_description("Total number of requests processed")
                .build(),
            request_duration: meter
                .f64_histogram("tern.server.request.duration")
                .with_description("Request processing duration in seconds")
                .with_unit("s")
                .build(),
            errors_total: meter
                .u64_counter("tern.server.errors.total")
                .with_description("Total number of failed requests by error kind")
                .build(),
            requests_active: meter
                .i64_up_down_counter("tern.server.requests.active")
                .with_description("Number of requests currently in flight")
                .build(),
        }
    }

    pub fn request_started(&self) {
        self.requests_active.add(1, &[]);
    }

    /// Record a finished request; `method` is empty when it never parsed
    pub fn record_request(&self, method: &str, status: &str, duration_secs: f64) {
        self.requests_active.add(-1, &[]);
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    pub fn record_error(&self, error_type: &str) {
        let attributes = &[KeyValue::new("error_type", error_type.to_string())];
        self.errors_total.add(1, attributes);
    }
}
