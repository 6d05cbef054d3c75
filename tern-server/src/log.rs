//! Stage-by-stage request log
//!
//! Each request emits one [`LogLine`] per stage transition. Lines go to two
//! places: an optional application hook set with `ServerBuilder::logger`,
//! and `tracing` events under the `tern_server::log` target. Neither can
//! change how the request is processed.
//!
//! | Kind | Level | Emitted when |
//! |---|---|---|
//! | `error-parse-method-details` | warn | method or input could not be read |
//! | `error-method-not-found` | warn | the path did not resolve |
//! | `method-description` | debug | the method resolved |
//! | `error-validate-input` | warn | the validator failed |
//! | `validation-passed` | debug | the validator succeeded |
//! | `error-resolve-method-rpc` | warn | the resolver raised a classified error |
//! | `error-resolve-method-unknown` | error | the resolver failed otherwise |
//! | `error-encode-output` | error | the output could not be encoded |
//! | `method-output` | debug | the call succeeded |

use std::sync::Arc;
use tern_core::{Error, RpcError, Value};

/// Application hook receiving every log line
pub type Logger = Arc<dyn Fn(&LogLine<'_>) + Send + Sync>;

/// One stage transition of a request
#[derive(Debug, Clone)]
pub enum LogLine<'a> {
    ErrorParseMethodDetails {
        error: &'a Error,
    },
    ErrorMethodNotFound {
        method: &'a str,
        input: &'a Value,
    },
    MethodDescription {
        method: &'a str,
        input: &'a Value,
    },
    ErrorValidateInput {
        method: &'a str,
        input: &'a Value,
        error: &'a Error,
    },
    ValidationPassed {
        method: &'a str,
        input: &'a Value,
        validated_input: &'a Value,
    },
    ErrorResolveMethodRpc {
        method: &'a str,
        input: &'a Value,
        validated_input: &'a Value,
        error: &'a RpcError,
    },
    ErrorResolveMethodUnknown {
        method: &'a str,
        input: &'a Value,
        validated_input: &'a Value,
        error: &'a Error,
    },
    ErrorEncodeOutput {
        method: &'a str,
        error: &'a Error,
    },
    MethodOutput {
        method: &'a str,
        input: &'a Value,
        validated_input: &'a Value,
        output: &'a Value,
    },
}

impl LogLine<'_> {
    /// Stable kebab-case name of the line
    pub fn kind(&self) -> &'static str {
        match self {
            LogLine::ErrorParseMethodDetails { .. } => "error-parse-method-details",
            LogLine::ErrorMethodNotFound { .. } => "error-method-not-found",
            LogLine::MethodDescription { .. } => "method-description",
            LogLine::ErrorValidateInput { .. } => "error-validate-input",
            LogLine::ValidationPassed { .. } => "validation-passed",
            LogLine::ErrorResolveMethodRpc { .. } => "error-resolve-method-rpc",
            LogLine::ErrorResolveMethodUnknown { .. } => "error-resolve-method-unknown",
            LogLine::ErrorEncodeOutput { .. } => "error-encode-output",
            LogLine::MethodOutput { .. } => "method-output",
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind().starts_with("error-")
    }

    /// Method path, once known
    pub fn method(&self) -> Option<&str> {
        match self {
            LogLine::ErrorParseMethodDetails { .. } => None,
            LogLine::ErrorMethodNotFound { method, .. }
            | LogLine::MethodDescription { method, .. }
            | LogLine::ErrorValidateInput { method, .. }
            | LogLine::ValidationPassed { method, .. }
            | LogLine::ErrorResolveMethodRpc { method, .. }
            | LogLine::ErrorResolveMethodUnknown { method, .. }
            | LogLine::ErrorEncodeOutput { method, .. }
            | LogLine::MethodOutput { method, .. } => Some(*method),
        }
    }

    pub(crate) fn trace(&self) {
        let kind = self.kind();
        match self {
            LogLine::ErrorParseMethodDetails { error } => {
                tracing::warn!(target: "tern_server::log", kind, error = %error, "Could not parse method details");
            }
            LogLine::ErrorMethodNotFound { method, .. } => {
                tracing::warn!(target: "tern_server::log", kind, method, "Method not found");
            }
            LogLine::ErrorValidateInput { method, error, .. } => {
                tracing::warn!(target: "tern_server::log", kind, method, error = %error, "Input validation failed");
            }
            LogLine::ErrorResolveMethodRpc { method, error, .. } => {
                tracing::warn!(target: "tern_server::log", kind, method, error = %error, "Resolver returned an error");
            }
            LogLine::ErrorResolveMethodUnknown { method, error, .. } => {
                tracing::error!(target: "tern_server::log", kind, method, error = %error, "Resolver failed");
            }
            LogLine::ErrorEncodeOutput { method, error } => {
                tracing::error!(target: "tern_server::log", kind, method, error = %error, "Output encoding failed");
            }
            LogLine::MethodDescription { method, .. }
            | LogLine::ValidationPassed { method, .. }
            | LogLine::MethodOutput { method, .. } => {
                tracing::debug!(target: "tern_server::log", kind, method);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_error_flag() {
        let error = Error::Internal("boom".into());
        let input = Value::Null;

        let line = LogLine::ErrorResolveMethodUnknown {
            method: "a.b",
            input: &input,
            validated_input: &input,
            error: &error,
        };
        assert_eq!(line.kind(), "error-resolve-method-unknown");
        assert!(line.is_error());
        assert_eq!(line.method(), Some("a.b"));

        let line = LogLine::MethodOutput {
            method: "a.b",
            input: &input,
            validated_input: &input,
            output: &input,
        };
        assert_eq!(line.kind(), "method-output");
        assert!(!line.is_error());

        let line = LogLine::ErrorParseMethodDetails { error: &error };
        assert_eq!(line.method(), None);
        line.trace();
    }
}
