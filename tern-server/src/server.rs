//! Request lifecycle
//!
//! [`Server::handle`] takes one [`Exchange`] through every stage and returns
//! the response to write back. It never fails: every failure becomes a JSON
//! error body `{ "error": { "message", "type" } }` with the error's status.
//!
//! # Stages
//!
//! 1. **Parse**: a GET carries `method` and `input` in the query string and
//!    is only allowed for `get*`/`list*` leaf names; a POST carries the
//!    `{ method, input }` envelope in its body
//! 2. **Resolve**: walk the service tree
//! 3. **Validate**: run the method's validator
//! 4. **Execute**: run server middleware, then method middleware, then the
//!    resolver
//! 5. **Encode**: encode the output with the codec
//!
//! Failures are classified per stage. Classified errors (`RpcError`) reach
//! the caller unchanged. An unclassified validator failure becomes
//! `BadRequest`; an unclassified failure in middleware or the resolver
//! becomes `InternalServerError` with a generic message, and the original
//! error only appears in the server log.
//!
//! Cookies and headers set through `RequestHelpers` are written to the
//! response whether the call succeeded or not.

use crate::builder::ServerBuilder;
use crate::exchange::{Exchange, MemoryExchange, RequestHelpers};
use crate::log::{LogLine, Logger};
use crate::metrics::ServerMetrics;
use crate::middleware::{Context, MiddlewareChain};
use crate::router::Router;
use std::sync::Arc;
use std::time::Instant;
use tern_core::codec;
use tern_core::{
    is_gettable, leaf_name, Error, ErrorBody, ErrorKind, HttpRequest, HttpResponse, Result, RpcError,
    Value, Verb,
};

const GENERIC_ERROR_MESSAGE: &str = "Internal server error";

/// The transport-independent RPC server
///
/// Cheap to clone; every clone shares the same service tree, middleware,
/// logger and metrics.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    router: Router,
    middleware: MiddlewareChain,
    logger: Option<Logger>,
    metrics: Option<Arc<ServerMetrics>>,
}

impl Server {
    pub(crate) fn new(
        router: Router,
        middleware: MiddlewareChain,
        logger: Option<Logger>,
        metrics: Option<Arc<ServerMetrics>>,
    ) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                router,
                middleware,
                logger,
                metrics,
            }),
        }
    }

    /// Create a new server builder
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    /// Process one request and produce its response
    #[tracing::instrument(skip_all, name = "server.handle", fields(verb = %exchange.verb()))]
    pub async fn handle<E: Exchange>(&self, mut exchange: E) -> HttpResponse {
        let start = Instant::now();
        if let Some(metrics) = &self.inner.metrics {
            metrics.request_started();
        }

        let verb = exchange.verb();
        let (method, input) = match parse_method_details(&mut exchange).await {
            Ok(details) => details,
            Err(error) => {
                self.log(&LogLine::ErrorParseMethodDetails { error: &error });
                self.record("", error.kind(), start);
                return error_response(&error);
            }
        };

        let request = RequestHelpers::new(
            method.as_str(),
            verb,
            exchange.headers().clone(),
            exchange.cookies(),
        );

        let (mut response, failure) = match self.process(&method, input, request.clone()).await {
            Ok(body) => (HttpResponse::json(200, body), None),
            Err(error) => (error_response(&error), error.kind()),
        };

        for (name, value) in request.take_response_headers().iter() {
            if name.eq_ignore_ascii_case("set-cookie") {
                response.headers.append(name, value);
            } else {
                response.headers.set(name, value);
            }
        }

        self.record(&method, failure, start);
        response
    }

    /// Process an owned request; the loopback path
    pub async fn call(&self, request: HttpRequest) -> HttpResponse {
        self.handle(MemoryExchange::new(request)).await
    }

    async fn process(&self, method_path: &str, input: Value, request: RequestHelpers) -> Result<String> {
        let Some(method) = self.inner.router.resolve(method_path) else {
            self.log(&LogLine::ErrorMethodNotFound {
                method: method_path,
                input: &input,
            });
            return Err(RpcError::method_not_found(format!("Method not found: {}", method_path)).into());
        };

        self.log(&LogLine::MethodDescription {
            method: method_path,
            input: &input,
        });

        let validated = match method.validator().validate(input.clone()).await {
            Ok(validated) => validated,
            Err(error) => {
                self.log(&LogLine::ErrorValidateInput {
                    method: method_path,
                    input: &input,
                    error: &error,
                });
                return Err(match error {
                    Error::Rpc(e) => e.into(),
                    other => RpcError::bad_request(message_of(&other)).into(),
                });
            }
        };

        self.log(&LogLine::ValidationPassed {
            method: method_path,
            input: &input,
            validated_input: &validated,
        });

        let mut chain = self.inner.middleware.clone();
        chain.extend(method.middleware());

        let resolver = Arc::clone(method.resolver());
        let resolver_input = validated.clone();
        let resolver_request = request.clone();
        let result = chain
            .execute(Context::new(), request, move |ctx| {
                resolver.resolve(resolver_input, ctx, resolver_request)
            })
            .await;

        let output = match result {
            Ok(output) => output,
            Err(Error::Rpc(error)) => {
                self.log(&LogLine::ErrorResolveMethodRpc {
                    method: method_path,
                    input: &input,
                    validated_input: &validated,
                    error: &error,
                });
                return Err(error.into());
            }
            Err(error) => {
                self.log(&LogLine::ErrorResolveMethodUnknown {
                    method: method_path,
                    input: &input,
                    validated_input: &validated,
                    error: &error,
                });
                return Err(RpcError::internal_server_error(GENERIC_ERROR_MESSAGE).into());
            }
        };

        match codec::encode(&output) {
            Ok(body) => {
                self.log(&LogLine::MethodOutput {
                    method: method_path,
                    input: &input,
                    validated_input: &validated,
                    output: &output,
                });
                Ok(body)
            }
            Err(error) => {
                self.log(&LogLine::ErrorEncodeOutput {
                    method: method_path,
                    error: &error,
                });
                Err(RpcError::internal_server_error(GENERIC_ERROR_MESSAGE).into())
            }
        }
    }

    fn log(&self, line: &LogLine<'_>) {
        line.trace();
        if let Some(logger) = &self.inner.logger {
            logger(line);
        }
    }

    fn record(&self, method: &str, failure: Option<ErrorKind>, start: Instant) {
        let Some(metrics) = &self.inner.metrics else {
            return;
        };
        let status = if failure.is_some() { "error" } else { "success" };
        metrics.record_request(method, status, start.elapsed().as_secs_f64());
        if let Some(kind) = failure {
            metrics.record_error(kind.as_str());
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("methods", &self.inner.router.methods())
            .field("middleware", &self.inner.middleware.len())
            .finish()
    }
}

/// Read the method path and raw input from the request
async fn parse_method_details<E: Exchange>(exchange: &mut E) -> Result<(String, Value)> {
    match exchange.verb() {
        Verb::Get => {
            let method = exchange
                .query("method")
                .filter(|m| !m.is_empty())
                .ok_or_else(|| RpcError::no_method_specified("Couldn't parse method from URL"))?;

            if !is_gettable(leaf_name(&method)) {
                return Err(RpcError::method_not_allowed(format!(
                    "Method {} is not allowed as a GET request",
                    method
                ))
                .into());
            }

            let input = match exchange.query("input") {
                Some(raw) if !raw.is_empty() => codec::decode(&raw).map_err(|e| {
                    RpcError::couldnt_parse_request(format!("Couldn't parse input: {}", message_of(&e)))
                })?,
                _ => Value::Null,
            };

            Ok((method, input))
        }
        Verb::Post => {
            let body = exchange.read_body().await.map_err(|e| {
                RpcError::couldnt_parse_request(format!("Couldn't read request body: {}", message_of(&e)))
            })?;

            let envelope = codec::decode_envelope(&body).map_err(|e| {
                RpcError::couldnt_parse_request(format!("Couldn't parse request body: {}", message_of(&e)))
            })?;

            let method = envelope
                .method
                .filter(|m| !m.is_empty())
                .ok_or_else(|| RpcError::no_method_specified("Couldn't parse method from post body"))?;

            Ok((method, envelope.input))
        }
    }
}

/// Message of an error without the variant prefix
fn message_of(error: &Error) -> String {
    match error {
        Error::Rpc(e) => e.message.clone(),
        Error::Codec(msg) | Error::Transport(msg) | Error::Internal(msg) => msg.clone(),
        other => other.to_string(),
    }
}

/// JSON error response for a failure
///
/// Only classified errors reach here from `handle`; anything else is
/// answered as a generic internal error.
fn error_response(error: &Error) -> HttpResponse {
    let rpc = match error {
        Error::Rpc(e) => e.clone(),
        _ => RpcError::internal_server_error(GENERIC_ERROR_MESSAGE),
    };
    let body = serde_json::to_string(&ErrorBody::from(&rpc)).unwrap_or_else(|_| {
        format!(
            "{{\"error\":{{\"message\":\"{}\",\"type\":\"InternalServerError\"}}}}",
            GENERIC_ERROR_MESSAGE
        )
    });
    HttpResponse::json(rpc.status_code, body)
}
