//! Server builder for constructing RPC servers
//!
//! The builder pattern provides a fluent API for configuring and creating
//! a [`Server`]. It allows you to:
//! - Define the service tree
//! - Add server-wide middleware
//! - Install a request logger
//! - Enable observability
//! - Set a bind address for the bundled HTTP listener
//!
//! `build()` returns a transport-independent [`Server`]. `listen()` also
//! binds the address and returns an [`HttpServer`] ready to `run()`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use tern_server::{accept_any, resolver_fn, Method, Server};
//! use tern_core::Value;
//!
//! # async fn example() -> tern_core::Result<()> {
//! let http = Server::builder()
//!     .bind_str("127.0.0.1:8080")?
//!     .service(|root| {
//!         root.namespace("status", |status| {
//!             status.method(
//!                 "getHealth",
//!                 Method::new(accept_any(), resolver_fn(|_, _, _| async { Ok(Value::from("ok")) })),
//!             )
//!         })
//!     })
//!     .logger(|line| println!("{}", line.kind()))
//!     .with_default_observability()
//!     .listen()
//!     .await?;
//!
//! http.run().await?;
//! # Ok(())
//! # }
//! ```

use crate::http::{HttpServer, DEFAULT_MAX_BODY_SIZE};
use crate::log::{LogLine, Logger};
use crate::metrics::ServerMetrics;
use crate::middleware::{Middleware, MiddlewareChain};
use crate::router::{Router, ServiceBuilder};
use crate::server::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use tern_core::{Error, ObservabilityConfig, Result};
use tokio::net::TcpListener;

/// Builder for constructing an RPC server
pub struct ServerBuilder {
    addr: Option<SocketAddr>,
    router: Router,
    middleware_chain: MiddlewareChain,
    logger: Option<Logger>,
    max_body_size: usize,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self {
            addr: None,
            router: Router::new(),
            middleware_chain: MiddlewareChain::new(),
            logger: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            observability_config: None,
            service_name: None,
        }
    }

    /// Set the bind address for `listen()`
    pub fn bind(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    /// Set the bind address from a string (e.g., "127.0.0.1:8080")
    pub fn bind_str(mut self, addr: &str) -> Result<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::Transport(format!("Invalid address: {}", e)))?;
        self.addr = Some(addr);
        Ok(self)
    }

    /// Set the service tree (replaces any previous one)
    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Define the service tree in place
    pub fn service<F>(mut self, build: F) -> Self
    where
        F: FnOnce(ServiceBuilder) -> ServiceBuilder,
    {
        self.router = Router::from_fn(build);
        self
    }

    /// Add server-wide middleware; runs before any method middleware
    pub fn use_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware_chain.add(middleware);
        self
    }

    /// Receive every request log line
    pub fn logger<F>(mut self, logger: F) -> Self
    where
        F: Fn(&LogLine<'_>) + Send + Sync + 'static,
    {
        self.logger = Some(Arc::new(logger));
        self
    }

    /// Cap request bodies read by the HTTP listener
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
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

    /// Build the server without binding anything
    pub fn build(self) -> Result<Server> {
        self.into_parts().map(|(server, _)| server)
    }

    /// Build the server and bind its HTTP listener
    pub async fn listen(self) -> Result<HttpServer> {
        let max_body_size = self.max_body_size;
        let (server, addr) = self.into_parts()?;
        let addr = addr.ok_or_else(|| Error::Transport("No bind address specified".to_string()))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Transport(format!("Failed to bind to {}: {}", addr, e)))?;

        tracing::info!(addr = %addr, "Server listening");

        Ok(HttpServer::new(listener, server).with_max_body_size(max_body_size))
    }

    fn into_parts(self) -> Result<(Server, Option<SocketAddr>)> {
        let metrics = if let Some(mut config) = self.observability_config {
            if let Some(name) = self.service_name {
                config.service_name = name;
            }

            tern_core::init_observability(config.clone())
                .map_err(|e| Error::Internal(format!("Failed to initialize observability: {}", e)))?;

            Some(Arc::new(ServerMetrics::new(config.service_name.as_str())))
        } else {
            None
        };

        let server = Server::new(self.router, self.middleware_chain, self.logger, metrics);
        Ok((server, self.addr))
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{accept_any, resolver_fn, Method};
    use crate::middleware::Passthrough;
    use tern_core::{HttpRequest, Value};

    #[test]
    fn test_builder_new() {
        let builder = ServerBuilder::new();
        assert!(builder.addr.is_none());
        assert!(builder.middleware_chain.is_empty());
        assert!(builder.observability_config.is_none());
        assert_eq!(builder.max_body_size, DEFAULT_MAX_BODY_SIZE);
    }

    #[tokio::test]
    async fn test_listen_applies_body_limit() {
        let http = ServerBuilder::new()
            .bind_str("127.0.0.1:0")
            .unwrap()
            .max_body_size(4096)
            .listen()
            .await
            .unwrap();
        assert_eq!(http.max_body_size(), 4096);
    }

    #[test]
    fn test_builder_bind_str() {
        let builder = ServerBuilder::new().bind_str("127.0.0.1:9000").unwrap();
        assert_eq!(builder.addr, Some("127.0.0.1:9000".parse().unwrap()));

        assert!(ServerBuilder::new().bind_str("not-an-address").is_err());
    }

    #[test]
    fn test_builder_middleware() {
        let builder = ServerBuilder::new()
            .use_middleware(Arc::new(Passthrough))
            .use_middleware(Arc::new(Passthrough));
        assert_eq!(builder.middleware_chain.len(), 2);
    }

    #[tokio::test]
    async fn test_listen_requires_address() {
        assert!(ServerBuilder::new().listen().await.is_err());
    }

    #[tokio::test]
    async fn test_build_and_call() {
        let server = ServerBuilder::new()
            .service(|root| {
                root.method(
                    "getAnswer",
                    Method::new(accept_any(), resolver_fn(|_, _, _| async { Ok(Value::from(42)) })),
                )
            })
            .build()
            .unwrap();

        let response = server
            .call(HttpRequest::get("http://localhost/?method=getAnswer"))
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "42");
    }
}
