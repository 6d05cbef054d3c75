//! Dynamic RPC client
//!
//! This module provides [`RpcClient`], which turns a dotted method path and
//! an input [`Value`] into one HTTP exchange with a tern server, and
//! [`MethodRef`], a reusable handle on a single path.
//!
//! # Call Lifecycle
//!
//! 1. **Build**: encode the input and pick a verb. `get*`/`list*` methods go
//!    out as GET when the full URL stays under 1000 characters; everything
//!    else is a POST of the `{ method, input }` envelope
//! 2. **Send**: hand the request to the transport, racing the abort signal
//!    if one was given
//! 3. **Interpret**: decode a 2xx body, or rebuild the classified error from
//!    the error body and the received status
//! 4. **Log**: report one [`CallLog`] to the logger hook, success or failure
//!
//! # Cloning
//!
//! `RpcClient` is cheaply cloneable using `Arc` internally. All clones
//! share the same transport, logger and path cache.
//!
//! # Examples
//!
//! ```rust,no_run
//! use tern_client::RpcClient;
//! use tern_core::Value;
//!
//! # async fn example() -> tern_core::Result<()> {
//! let client = RpcClient::new("http://localhost:8080/rpc")?;
//!
//! let users = client.method("users");
//! let user = users.get("getUser").call(Value::object(vec![("id", Value::from(1))])).await?;
//!
//! if let Some(born) = user.get("dateOfBirth").and_then(Value::as_date) {
//!     println!("born {}", born);
//! }
//! # Ok(())
//! # }
//! ```

use crate::client_builder::ClientBuilder;
use crate::metrics::ClientMetrics;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tern_core::codec;
use tern_core::{
    from_value, is_gettable, leaf_name, to_value, Error, ErrorBody, Headers, HttpRequest,
    HttpResponse, Result, Transport, Value, Verb,
};
use tokio_util::sync::CancellationToken;
use url::Url;

/// GET is only used while the full URL is shorter than this
pub const MAX_GET_URL_LENGTH: usize = 1000;

/// Hook receiving one record per call
pub type CallLogger = Arc<dyn Fn(&CallLog) + Send + Sync>;

/// Record of one finished call
#[derive(Debug, Clone)]
pub struct CallLog {
    /// Dotted method path
    pub method: String,
    /// Target URL, including the query string for GET
    pub url: String,
    pub verb: Verb,
    /// `None` when the transport failed or the call was aborted
    pub response: Option<HttpResponse>,
    /// True for a 2xx response
    pub ok: bool,
    pub elapsed: Duration,
    /// What the caller received
    pub result: Result<Value>,
}

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    abort: Option<CancellationToken>,
    headers: Headers,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abandon the call when `signal` is cancelled
    pub fn abort(mut self, signal: CancellationToken) -> Self {
        self.abort = Some(signal);
        self
    }

    /// Send an extra request header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }
}

/// RPC client over a [`Transport`]
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    base_url: Url,
    transport: Arc<dyn Transport>,
    default_headers: Headers,
    logger: Option<CallLogger>,
    metrics: Option<Arc<ClientMetrics>>,
    paths: Mutex<HashMap<String, Arc<str>>>,
}

impl RpcClient {
    pub(crate) fn from_parts(
        base_url: Url,
        transport: Arc<dyn Transport>,
        default_headers: Headers,
        logger: Option<CallLogger>,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                base_url,
                transport,
                default_headers,
                logger,
                metrics,
                paths: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Client for `url` over the default HTTP transport
    pub fn new(url: impl Into<String>) -> Result<Self> {
        ClientBuilder::new(url).build()
    }

    /// Create a new client builder
    pub fn builder(url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(url)
    }

    pub fn base_url(&self) -> &str {
        self.inner.base_url.as_str()
    }

    /// Handle on a method path; repeated paths share one allocation
    pub fn method(&self, path: &str) -> MethodRef {
        let path = {
            let mut paths = self.inner.paths.lock();
            match paths.get(path) {
                Some(cached) => Arc::clone(cached),
                None => {
                    let cached: Arc<str> = Arc::from(path);
                    paths.insert(path.to_string(), Arc::clone(&cached));
                    cached
                }
            }
        };

        MethodRef {
            client: self.clone(),
            path,
        }
    }

    /// Number of distinct paths handed out so far
    pub fn cached_paths(&self) -> usize {
        self.inner.paths.lock().len()
    }

    /// Call `path` with `input`
    pub async fn call(&self, path: &str, input: impl Into<Value>) -> Result<Value> {
        self.call_with(path, input, CallOptions::default()).await
    }

    /// Call `path` with `input` and per-call options
    #[tracing::instrument(skip(self, input, options), fields(method = %path))]
    pub async fn call_with(
        &self,
        path: &str,
        input: impl Into<Value>,
        options: CallOptions,
    ) -> Result<Value> {
        let start = Instant::now();
        let input = input.into();

        let request = match self.build_request(path, &input, &options.headers) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(error = %e, "Request could not be built");
                return Err(e);
            }
        };
        let url = request.url.clone();
        let verb = request.verb;

        let sent = match &options.abort {
            Some(signal) => {
                tokio::select! {
                    biased;
                    _ = signal.cancelled() => Err(Error::Aborted),
                    sent = self.inner.transport.send(request) => sent,
                }
            }
            None => self.inner.transport.send(request).await,
        };

        let (response, result) = match sent {
            Ok(response) => {
                let result = interpret(&response);
                (Some(response), result)
            }
            Err(Error::Aborted) => (None, Err(Error::Aborted)),
            Err(Error::Transport(msg)) => (None, Err(Error::Transport(msg))),
            Err(other) => (None, Err(Error::Transport(other.to_string()))),
        };

        let elapsed = start.elapsed();
        self.record(path, &result, elapsed);

        match &result {
            Ok(_) => tracing::debug!(verb = %verb, elapsed_ms = elapsed.as_millis() as u64, "Call completed"),
            Err(e) => tracing::debug!(verb = %verb, error = %e, "Call failed"),
        }

        if let Some(logger) = &self.inner.logger {
            let ok = response.as_ref().map_or(false, HttpResponse::is_success);
            logger(&CallLog {
                method: path.to_string(),
                url,
                verb,
                response,
                ok,
                elapsed,
                result: result.clone(),
            });
        }

        result
    }

    /// Call with serde types on both sides
    ///
    /// Extended values are flattened on the way in; use [`RpcClient::call`]
    /// to keep dates, sets and maps typed in the output.
    pub async fn call_typed<P, R>(&self, path: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let input = to_value(params)?;
        let output = self.call(path, input).await?;
        from_value(&output)
    }

    /// Build the outgoing request for a call
    pub fn build_request(&self, path: &str, input: &Value, extra: &Headers) -> Result<HttpRequest> {
        let mut request = self.select_verb(path, input)?;
        request.headers.extend(self.inner.default_headers.clone());
        request.headers.extend(extra.clone());
        Ok(request)
    }

    fn select_verb(&self, path: &str, input: &Value) -> Result<HttpRequest> {
        if is_gettable(leaf_name(path)) {
            let encoded = codec::encode(input)?;
            let mut url = self.inner.base_url.clone();
            url.query_pairs_mut()
                .append_pair("method", path)
                .append_pair("input", &encoded);

            if url.as_str().len() < MAX_GET_URL_LENGTH {
                return Ok(HttpRequest::get(url.as_str()));
            }
        }

        let body = codec::encode_envelope(path, input)?;
        Ok(HttpRequest::post(self.inner.base_url.as_str(), body))
    }

    fn record(&self, path: &str, result: &Result<Value>, elapsed: Duration) {
        let Some(metrics) = &self.inner.metrics else {
            return;
        };
        let secs = elapsed.as_secs_f64();
        match result {
            Ok(_) => metrics.record_request(path, "success", secs),
            Err(e) => {
                metrics.record_request(path, "error", secs);
                let kind = match e {
                    Error::Rpc(rpc) => rpc.kind.as_str(),
                    Error::Aborted => "Aborted",
                    Error::Transport(_) => "Transport",
                    Error::UnexpectedResponse { .. } => "UnexpectedResponse",
                    Error::Codec(_) => "Codec",
                    Error::Internal(_) => "Internal",
                };
                metrics.record_error(kind);
            }
        }
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish()
    }
}

/// Decode a response into the call's result
fn interpret(response: &HttpResponse) -> Result<Value> {
    if response.is_success() {
        return codec::decode(&response.body);
    }

    match serde_json::from_str::<ErrorBody>(&response.body) {
        Ok(body) => Err(body.into_rpc_error(response.status).into()),
        Err(_) => Err(Error::UnexpectedResponse {
            status: response.status,
            body: response.body.clone(),
        }),
    }
}

/// A method path bound to a client
///
/// Building and extending a `MethodRef` performs no I/O; only `call` and
/// `call_with` do.
#[derive(Clone)]
pub struct MethodRef {
    client: RpcClient,
    path: Arc<str>,
}

impl MethodRef {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Extend the path by one segment
    pub fn get(&self, segment: &str) -> MethodRef {
        self.client.method(&format!("{}.{}", self.path, segment))
    }

    pub async fn call(&self, input: impl Into<Value>) -> Result<Value> {
        self.client.call(&self.path, input).await
    }

    pub async fn call_with(&self, input: impl Into<Value>, options: CallOptions) -> Result<Value> {
        self.client.call_with(&self.path, input, options).await
    }
}

impl std::fmt::Debug for MethodRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MethodRef").field(&&*self.path).finish()
    }
}
