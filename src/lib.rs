//! tern - type-preserving RPC over HTTP
//!
//! This is the main convenience crate that re-exports all tern sub-crates.
//! Use this crate if you want a single dependency that provides both client
//! and server functionality.
//!
//! # Architecture
//!
//! tern is organized into modular crates:
//!
//! - **tern-core**: value model, codec, error taxonomy, HTTP types, observability
//! - **tern-server**: service tree, middleware, request lifecycle, hyper binding
//! - **tern-client**: dynamic client proxy, hyper transport, cancellation
//!
//! # Quick Start - Server
//!
//! ```rust,no_run
//! use tern::{accept_any, resolver_fn, Method, Server, Value};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let http = Server::builder()
//!         .bind_str("127.0.0.1:8080")?
//!         .service(|root| {
//!             root.namespace("clock", |clock| {
//!                 clock.method(
//!                     "getNow",
//!                     Method::new(accept_any(), resolver_fn(|_, _, _| async {
//!                         Ok(Value::date(chrono::Utc::now()))
//!                     })),
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
//! # Quick Start - Client
//!
//! ```rust,no_run
//! use tern::{RpcClient, Value};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RpcClient::new("http://127.0.0.1:8080")?;
//!
//!     let now = client.method("clock").get("getNow").call(Value::Null).await?;
//!     println!("server time: {:?}", now.as_date());
//!
//!     Ok(())
//! }
//! ```

// Re-export all public APIs from sub-crates
pub use tern_client as client;
pub use tern_core as core;
pub use tern_server as server;

// Convenience re-exports of the most commonly used types
pub use tern_client::{CallOptions, ClientBuilder, MethodRef, RpcClient};
pub use tern_core::{Error, ErrorKind, Result, RpcError, Value};
pub use tern_server::{accept_any, resolver_fn, validate_as, Method, Router, Server, ServerBuilder};
