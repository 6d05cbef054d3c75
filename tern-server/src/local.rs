//! In-process transport
//!
//! [`LocalTransport`] hands each request straight to a [`Server`] without a
//! socket. Clients built on it go through the exact same codec, routing and
//! error paths as over HTTP, which makes it the usual choice for tests.
//!
//! # Examples
//!
//! ```rust
//! use tern_server::{accept_any, resolver_fn, LocalTransport, Method, Server};
//! use tern_core::{HttpRequest, Transport, Value};
//!
//! # async fn example() -> tern_core::Result<()> {
//! let server = Server::builder()
//!     .service(|root| {
//!         root.method("getPing", Method::new(accept_any(), resolver_fn(|_, _, _| async {
//!             Ok(Value::from("pong"))
//!         })))
//!     })
//!     .build()?;
//!
//! let transport = LocalTransport::new(server);
//! let response = transport.send(HttpRequest::get("http://local/?method=getPing")).await?;
//! assert_eq!(response.body, "\"pong\"");
//! # Ok(())
//! # }
//! ```

use crate::server::Server;
use async_trait::async_trait;
use tern_core::{HttpRequest, HttpResponse, Result, Transport};

/// Loopback transport into a [`Server`]
#[derive(Debug, Clone)]
pub struct LocalTransport {
    server: Server,
}

impl LocalTransport {
    pub fn new(server: Server) -> Self {
        Self { server }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    #[tracing::instrument(skip_all, fields(verb = %request.verb))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        Ok(self.server.call(request).await)
    }
}
