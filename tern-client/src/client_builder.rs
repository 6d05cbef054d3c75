//! Client builder for configuring transport, logging and observability
//!
//! The `ClientBuilder` provides a fluent API for configuring client behavior
//! before the first call. It allows you to:
//! - Replace the HTTP transport (for example with an in-process loopback)
//! - Add headers sent with every call
//! - Install a per-call logger
//! - Configure observability (OpenTelemetry)
//!
//! # Examples
//!
//! ```rust,no_run
//! use tern_client::ClientBuilder;
//!
//! # fn example() -> tern_core::Result<()> {
//! let client = ClientBuilder::new("http://localhost:8080/rpc")
//!     .default_header("Authorization", "Bearer token")
//!     .logger(|log| println!("{} {} -> ok={}", log.verb, log.method, log.ok))
//!     .with_default_observability()
//!     .service_name("billing-ui")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::client::{CallLog, CallLogger, RpcClient};
use crate::metrics::ClientMetrics;
use crate::transport::HyperTransport;
use std::sync::Arc;
use tern_core::{Error, Headers, ObservabilityConfig, Result, Transport};
use url::Url;

/// Builder for configuring and creating an [`RpcClient`]
pub struct ClientBuilder {
    url: String,
    transport: Option<Arc<dyn Transport>>,
    default_headers: Headers,
    logger: Option<CallLogger>,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ClientBuilder {
    /// Create a new client builder for the server at `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            transport: None,
            default_headers: Headers::new(),
            logger: None,
            observability_config: None,
            service_name: None,
        }
    }

    /// Use a custom transport instead of HTTP
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Send a header with every call
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.append(name, value);
        self
    }

    /// Receive one [`CallLog`] per call
    pub fn logger<F>(mut self, logger: F) -> Self
    where
        F: Fn(&CallLog) + Send + Sync + 'static,
    {
        self.logger = Some(Arc::new(logger));
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Set service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Build the client
    pub fn build(self) -> Result<RpcClient> {
        let base_url = Url::parse(&self.url)
            .map_err(|e| Error::Transport(format!("Invalid server URL {}: {}", self.url, e)))?;

        let metrics = if let Some(mut config) = self.observability_config {
            if let Some(name) = self.service_name {
                config.service_name = name;
            }

            tern_core::init_observability(config.clone())
                .map_err(|e| Error::Internal(format!("Failed to initialize observability: {}", e)))?;

            Some(Arc::new(ClientMetrics::new(config.service_name.as_str())))
        } else {
            None
        };

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HyperTransport::new()) as Arc<dyn Transport>);

        tracing::debug!(url = %base_url, "Client configured");

        Ok(RpcClient::from_parts(
            base_url,
            transport,
            self.default_headers,
            self.logger,
            metrics,
        ))
    }
}
