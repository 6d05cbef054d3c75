//! Type-preserving RPC server
//!
//! This crate serves a tree of methods over HTTP. Requests and responses are
//! JSON, but dates, regular expressions, maps, sets and big integers keep
//! their types end to end through the tern codec.
//!
//! # Core Features
//!
//! - **Service tree**: methods nested in namespaces, addressed by dotted path
//! - **Validation**: every method validates its input before it runs
//! - **Middleware**: server-wide and per-method chains that build a context
//! - **Error taxonomy**: classified errors keep their kind, message and status
//! - **Cookies and headers**: resolvers and middleware can read and set both
//! - **Observability**: OpenTelemetry traces and metrics, structured logging
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tern_server::{typed_resolver, validate_as, Method, Server};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct AddParams { a: i64, b: i64 }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let http = Server::builder()
//!         .bind_str("127.0.0.1:8080")?
//!         .service(|root| {
//!             root.namespace("math", |math| {
//!                 math.method(
//!                     "getSum",
//!                     Method::new(
//!                         validate_as::<AddParams>(),
//!                         typed_resolver(|p: AddParams, _ctx, _request| async move { Ok(p.a + p.b) }),
//!                     ),
//!                 )
//!             })
//!         })
//!         .listen()
//!         .await?;
//!
//!     http.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! [`Server`] is transport independent: it takes an [`Exchange`] and returns
//! an `HttpResponse`. Two bindings ship with the crate:
//!
//! - **HttpServer**: hyper HTTP/1.1, one task per connection
//! - **LocalTransport**: in-process loopback implementing `tern_core::Transport`
//!
//! The service tree and middleware are immutable after `build()`, so a
//! server is shared between connections by cloning an `Arc`.

mod builder;
mod exchange;
mod handler;
mod http;
mod local;
mod log;
mod metrics;
pub mod middleware;
mod router;
mod server;

pub use builder::ServerBuilder;
pub use exchange::{
    parse_cookies, query_pairs, CookieOptions, Exchange, MemoryExchange, RequestHelpers, SameSite,
};
pub use handler::{
    accept_any, no_input, resolver_fn, typed_resolver, validate_as, validator_fn, AcceptAny,
    AsyncResolver, AsyncValidator, HandlerResult, Method, NoInput, Resolver, ValidateAs, Validator,
};
pub use http::{HttpServer, HyperExchange, DEFAULT_MAX_BODY_SIZE};
pub use local::LocalTransport;
pub use log::{LogLine, Logger};
pub use metrics::ServerMetrics;
pub use middleware::{Context, Middleware, MiddlewareChain, Next, Passthrough, TracingMiddleware};
pub use router::{Router, ServiceBuilder, ServiceNode};
pub use server::Server;
