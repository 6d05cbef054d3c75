//! Client metrics definitions
//!
//! This module defines OpenTelemetry metrics for monitoring calls made by a
//! tern client. Metrics are exported to the configured observability
//! backend.
//!
//! # Metrics Collected
//!
//! - **tern.client.requests.total**: calls made, by method and outcome (counter)
//! - **tern.client.request.duration**: call latency in seconds (histogram)
//! - **tern.client.errors.total**: failed calls, by error kind (counter)
//!
//! # Usage
//!
//! Metrics are automatically recorded when observability is enabled via
//! `ClientBuilder::with_observability()`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use tern_client::ClientMetrics;
//!
//! let metrics = ClientMetrics::new("my-client");
//! metrics.record_request("users.getUser", "success", 0.012);
//! ```

use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// Total number of calls made
    pub requests_total: Counter<u64>,
    /// Call duration in seconds
    pub request_duration: Histogram<f64>,
    /// Total number of failed calls
    pub errors_total: Counter<u64>,
}

impl ClientMetrics {
    /// Create a new ClientMetrics instance
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Create a new ClientMetrics instance with a custom meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            requests_total: meter
                .u64_counter("tern.client.requests.total")
                .with_description("Total number of calls made")
                .build(),
            request_duration: meter
                .f64_histogram("tern.client.request.duration")
                .with_description("Call duration in seconds")
                .with_unit("s")
                .build(),
            errors_total: meter
                .u64_counter("tern.client.errors.total")
                .with_description("Total number of failed calls by error kind")
                .build(),
        }
    }

    /// Record a finished call
    pub fn record_request(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    /// Record an error
    pub fn record_error(&self, error_type: &str) {
        let attributes = &[KeyValue::new("error_type", error_type.to_string())];
        self.errors_total.add(1, attributes);
    }
}
