//! Type-preserving RPC client
//!
//! This crate calls methods on a tern server. A call is addressed by dotted
//! path, carries a [`tern_core::Value`] input and returns a `Value` output,
//! with dates, regular expressions, maps, sets and big integers kept intact
//! by the tern codec.
//!
//! # Core Features
//!
//! - **Dynamic paths**: `client.method("users").get("getUser")` builds a path
//!   without any I/O; handles are cached per client
//! - **Verb selection**: cacheable reads go out as GET, everything else as POST
//! - **Classified errors**: server errors come back with their kind, message
//!   and status, ready for the `is_*` predicates
//! - **Cancellation**: abort any call through a `CancellationToken`
//! - **Pluggable transport**: hyper by default, or any `Transport`
//! - **Observability**: per-call log hook, OpenTelemetry metrics and traces
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tern_client::RpcClient;
//! use tern_core::{is_not_found, Value};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RpcClient::new("http://localhost:8080/rpc")?;
//!
//!     match client.call("users.getUser", Value::object(vec![("id", Value::from(7))])).await {
//!         Ok(user) => println!("user: {:?}", user),
//!         Err(e) if is_not_found(&e) => println!("no such user"),
//!         Err(e) => return Err(e.into()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Cancellation
//!
//! ```rust,no_run
//! use tern_client::{CallOptions, RpcClient};
//! use tern_core::Value;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(client: RpcClient) {
//! let signal = CancellationToken::new();
//! let pending = client.call_with("reports.getYearly", Value::Null, CallOptions::new().abort(signal.clone()));
//! signal.cancel();
//! assert!(pending.await.is_err());
//! # }
//! ```

mod client;
mod client_builder;
mod metrics;
mod transport;

pub use client::{CallLog, CallLogger, CallOptions, MethodRef, RpcClient, MAX_GET_URL_LENGTH};
pub use client_builder::ClientBuilder;
pub use metrics::ClientMetrics;
pub use transport::HyperTransport;
