//! Error types for tern
//!
//! This module provides the error taxonomy shared by server and client.
//! It defines two main error types:
//!
//! - **RpcError**: A classified error with a fixed kind and HTTP status. This
//!   is what crosses the wire and what the client reconstructs.
//! - **Error**: The workspace error enum (uses thiserror). It wraps `RpcError`
//!   and adds the unclassified failures (codec, transport, aborted calls).
//!
//! # Error Kinds
//!
//! | Kind | Status | Raised when |
//! |---|---|---|
//! | `CouldntParseRequest` | 400 | body or query could not be parsed |
//! | `NoMethodSpecified` | 400 | the request names no method |
//! | `MethodNotAllowed` | 400 | the verb is not allowed for the method |
//! | `MethodNotFound` | 400 | the method path does not resolve |
//! | `BadRequest` | 400 | the validator rejected the input |
//! | `Unauthorized` | 401 | the caller is not authenticated |
//! | `Forbidden` | 403 | the caller is not permitted |
//! | `NotFound` | 404 | the target entity does not exist |
//! | `InternalServerError` | 500 | the resolver failed in an unclassified way |
//!
//! Classification is decided by the `kind` field alone: two errors with the
//! same kind are the same class regardless of message or status.
//!
//! # Examples
//!
//! ```rust
//! use tern_core::{Error, ErrorKind, RpcError};
//!
//! let error = RpcError::unauthorized("Log in first");
//! assert_eq!(error.status_code, 401);
//! assert!(error.is_unauthorized());
//!
//! // Wrapped in the workspace error the predicates still work
//! let error: Error = error.into();
//! assert!(tern_core::is_unauthorized(&error));
//! assert_eq!(error.kind(), Some(ErrorKind::Unauthorized));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Result type for tern operations
pub type Result<T> = std::result::Result<T, Error>;

/// Workspace error type
///
/// `Rpc` is the only classified variant. Everything else is unclassified:
/// the server widens it to `InternalServerError` before it reaches a caller,
/// and the client uses it for failures that never produced a classified
/// response.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A classified error with a kind and a status code
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Value could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(String),

    /// The transport failed before a response arrived
    #[error("Transport error: {0}")]
    Transport(String),

    /// The call was cancelled through its abort signal
    #[error("Call aborted")]
    Aborted,

    /// A non-success response whose body is not a recognizable error
    #[error("Unexpected response (status {status}): {body}")]
    UnexpectedResponse {
        /// HTTP status code of the response
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Unclassified application failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The classified kind, if this is an `RpcError`
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Rpc(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Borrow the inner `RpcError`, if classified
    pub fn as_rpc(&self) -> Option<&RpcError> {
        match self {
            Error::Rpc(e) => Some(e),
            _ => None,
        }
    }

    /// Shorthand for an unclassified failure
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Codec(e.to_string())
    }
}

/// The closed set of error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    CouldntParseRequest,
    NoMethodSpecified,
    MethodNotAllowed,
    MethodNotFound,
    InternalServerError,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
}

impl ErrorKind {
    /// All kinds, in declaration order
    pub const ALL: [ErrorKind; 9] = [
        ErrorKind::CouldntParseRequest,
        ErrorKind::NoMethodSpecified,
        ErrorKind::MethodNotAllowed,
        ErrorKind::MethodNotFound,
        ErrorKind::InternalServerError,
        ErrorKind::BadRequest,
        ErrorKind::Unauthorized,
        ErrorKind::Forbidden,
        ErrorKind::NotFound,
    ];

    /// The status a factory assigns to this kind
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::CouldntParseRequest
            | ErrorKind::NoMethodSpecified
            | ErrorKind::MethodNotAllowed
            | ErrorKind::MethodNotFound
            | ErrorKind::BadRequest => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::InternalServerError => 500,
        }
    }

    /// The name used in the wire `type` field
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::CouldntParseRequest => "CouldntParseRequest",
            ErrorKind::NoMethodSpecified => "NoMethodSpecified",
            ErrorKind::MethodNotAllowed => "MethodNotAllowed",
            ErrorKind::MethodNotFound => "MethodNotFound",
            ErrorKind::InternalServerError => "InternalServerError",
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "NotFound",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ErrorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::Codec(format!("unknown error type: {}", s)))
    }
}

/// A classified error
///
/// Construct through the per-kind factories so the status always matches
/// the kind. The client side uses [`RpcError::new`] to rebuild an error with
/// the status it actually received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RpcError {
    pub kind: ErrorKind,
    pub message: String,
    pub status_code: u16,
}

macro_rules! factories {
    ($($(#[$doc:meta])* $name:ident => $kind:ident, $pred:ident;)*) => {
        impl RpcError {
            $(
                $(#[$doc])*
                pub fn $name(msg: impl Into<String>) -> Self {
                    Self::of(ErrorKind::$kind, msg)
                }

                pub fn $pred(&self) -> bool {
                    self.kind == ErrorKind::$kind
                }
            )*
        }

        $(
            pub fn $pred(error: &Error) -> bool {
                error.as_rpc().map_or(false, RpcError::$pred)
            }
        )*
    };
}

factories! {
    /// The request body or query could not be parsed
    couldnt_parse_request => CouldntParseRequest, is_couldnt_parse_request;
    /// The request names no method
    no_method_specified => NoMethodSpecified, is_no_method_specified;
    /// The verb is not allowed for this method
    method_not_allowed => MethodNotAllowed, is_method_not_allowed;
    /// The method path does not resolve
    method_not_found => MethodNotFound, is_method_not_found;
    /// Unclassified resolver failure
    internal_server_error => InternalServerError, is_internal_server_error;
    /// The input failed validation
    bad_request => BadRequest, is_bad_request;
    /// The caller is not authenticated
    unauthorized => Unauthorized, is_unauthorized;
    /// The caller is not permitted
    forbidden => Forbidden, is_forbidden;
    /// The target entity does not exist
    not_found => NotFound, is_not_found;
}

impl RpcError {
    /// Build an error with an explicit status
    pub fn new(kind: ErrorKind, message: impl Into<String>, status_code: u16) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code,
        }
    }

    /// Build an error with the kind's default status
    pub fn of(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, kind.status_code())
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

/// True for any classified error
pub fn is_rpc_error(error: &Error) -> bool {
    matches!(error, Error::Rpc(_))
}

/// Wire format of an error response body: `{"error": {"message", "type"}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
}

impl ErrorBody {
    /// Rebuild the classified error this body describes
    pub fn into_rpc_error(self, status_code: u16) -> RpcError {
        RpcError::new(self.error.kind, self.error.message, status_code)
    }
}

impl From<&RpcError> for ErrorBody {
    fn from(e: &RpcError) -> Self {
        Self {
            error: ErrorPayload {
                message: e.message.clone(),
                kind: e.kind,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_factory_statuses() {
        assert_eq!(RpcError::couldnt_parse_request("x").status_code, 400);
        assert_eq!(RpcError::no_method_specified("x").status_code, 400);
        assert_eq!(RpcError::method_not_allowed("x").status_code, 400);
        assert_eq!(RpcError::method_not_found("x").status_code, 400);
        assert_eq!(RpcError::bad_request("x").status_code, 400);
        assert_eq!(RpcError::unauthorized("x").status_code, 401);
        assert_eq!(RpcError::forbidden("x").status_code, 403);
        assert_eq!(RpcError::not_found("x").status_code, 404);
        assert_eq!(RpcError::internal_server_error("x").status_code, 500);
    }

    #[test]
    fn test_predicates_compare_kind_only() {
        let rebuilt = RpcError::new(ErrorKind::Forbidden, "other message", 418);
        assert!(rebuilt.is_forbidden());
        assert!(!rebuilt.is_unauthorized());
        assert!(rebuilt.is(ErrorKind::Forbidden));
    }

    #[test]
    fn test_free_predicates_on_workspace_error() {
        let error: Error = RpcError::not_found("no such user").into();
        assert!(is_rpc_error(&error));
        assert!(is_not_found(&error));
        assert!(!is_bad_request(&error));

        let error = Error::Transport("connection refused".into());
        assert!(!is_rpc_error(&error));
        assert!(!is_not_found(&error));
    }

    #[test]
    fn test_kind_round_trips_through_name() {
        for kind in ErrorKind::ALL {
            assert_eq!(kind.as_str().parse::<ErrorKind>().unwrap(), kind);
        }
        assert!("Teapot".parse::<ErrorKind>().is_err());
    }

    #[test]
    fn test_error_body_wire_shape() {
        let body = ErrorBody::from(&RpcError::unauthorized("Log in first"));
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"error": {"message": "Log in first", "type": "Unauthorized"}})
        );
    }

    #[test]
    fn test_error_body_rebuilds_with_received_status() {
        let body: ErrorBody = serde_json::from_value(json!({
            "error": {"message": "nope", "type": "NotFound"}
        }))
        .unwrap();

        let error = body.into_rpc_error(404);
        assert!(error.is_not_found());
        assert_eq!(error.message, "nope");
        assert_eq!(error.status_code, 404);
    }

    #[test]
    fn test_error_display_formatting() {
        let error: Error = RpcError::bad_request("id must be a number").into();
        assert_eq!(error.to_string(), "BadRequest: id must be a number");
        assert_eq!(Error::Aborted.to_string(), "Call aborted");
    }

    #[test]
    fn test_error_from_serde() {
        let serde_error = serde_json::from_str::<serde_json::Value>("{\"invalid\": json").unwrap_err();
        let error = Error::from(serde_error);
        assert!(matches!(error, Error::Codec(msg) if !msg.is_empty()));
    }
}
