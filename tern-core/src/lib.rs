//! Core types and codec for tern
//!
//! This crate provides the foundation shared by the tern server and client.
//! It includes:
//!
//! - **Value**: The extended value model (dates, regular expressions, ordered
//!   maps and sets, big integers on top of plain JSON)
//! - **Codec**: Lossless encoding of `Value` to JSON text and back
//! - **Error handling**: The classified error taxonomy and the workspace error
//! - **Types**: Transport-level request/response types and the `Transport` trait
//! - **Observability**: OpenTelemetry integration for tracing, metrics and logs
//!
//! # Architecture
//!
//! The crate is transport-agnostic. It defines what goes over the wire but
//! not how. The `tern-server` and `tern-client` crates build on it with a
//! dispatcher, an HTTP binding and a dynamic client proxy.
//!
//! # Example
//!
//! ```rust
//! use tern_core::{codec, MapKey, Value};
//!
//! let output = Value::object(vec![
//!     ("tags", Value::set(vec![Value::from("a"), Value::from("b")])),
//!     ("limits", Value::map(vec![(MapKey::from("daily"), Value::from(10))])),
//! ]);
//!
//! let text = codec::encode(&output).unwrap();
//! assert_eq!(codec::decode(&text).unwrap(), output);
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;
pub mod value;

// Re-export the most commonly used types for convenience
pub use error::{
    is_bad_request, is_couldnt_parse_request, is_forbidden, is_internal_server_error,
    is_method_not_allowed, is_method_not_found, is_no_method_specified, is_not_found,
    is_rpc_error, is_unauthorized, Error, ErrorBody, ErrorKind, ErrorPayload, Result, RpcError,
};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{
    is_gettable, leaf_name, Headers, HttpRequest, HttpResponse, Transport, Verb,
    JSON_CONTENT_TYPE,
};
pub use value::{from_value, to_value, MapKey, RegExp, Value, ValueMap, ValueSet};
