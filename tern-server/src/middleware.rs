//! Middleware pipeline between dispatch and the resolver
//!
//! Middleware wraps the resolver of a method. Each middleware receives the
//! current [`Context`], the request helpers and a [`Next`] continuation. It
//! can:
//! - Add to the context before passing it on
//! - Short-circuit by returning without calling `next`
//! - Inspect or replace the result that comes back from `next`
//! - Read cookies and headers, and set response cookies and headers
//!
//! # Composition
//!
//! A chain `[m1, m2, m3]` runs as `m1(next = m2(next = m3(next = resolver)))`.
//! The context `m1` passes to `next` is the one `m2` receives. An empty chain
//! calls the resolver directly with the starting context.
//!
//! `Next::run` takes `self`, so a middleware can call it at most once.
//!
//! # Built-in Middleware
//!
//! - **Passthrough**: calls `next` unchanged
//! - **TracingMiddleware**: runs the rest of the chain inside an `rpc_request` span
//!
//! # Examples
//!
//! ```rust
//! use tern_server::{middleware, Context, MiddlewareChain};
//! use tern_core::{RpcError, Value};
//!
//! let auth = middleware::from_fn(|mut ctx: Context, request, next: middleware::Next| async move {
//!     let Some(token) = request.header("authorization") else {
//!         return Err(RpcError::unauthorized("Missing credentials").into());
//!     };
//!     ctx.insert_metadata("token", Value::from(token));
//!     next.run(ctx).await
//! });
//!
//! let mut chain = MiddlewareChain::new();
//! chain.add(auth);
//! assert_eq!(chain.len(), 1);
//! ```

use crate::exchange::RequestHelpers;
use crate::handler::HandlerResult;
use async_trait::async_trait;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tern_core::{Result, Value};
use tracing::Instrument;

/// Per-request record that middleware builds up for the resolver
///
/// Starts empty for every request and is dropped when the request ends.
/// Holds string-keyed `Value` metadata plus one slot per Rust type for
/// values that are not serializable (a loaded user, a database handle).
#[derive(Clone, Default)]
pub struct Context {
    metadata: HashMap<String, Value>,
    extensions: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert metadata that later middleware and the resolver can read
    pub fn insert_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    /// Store a typed value, replacing any previous value of the same type
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty() && self.extensions.is_empty()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("metadata", &self.metadata)
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

/// The innermost step of a chain, usually the resolver
pub type Endpoint = Box<dyn FnOnce(Context) -> HandlerResult + Send>;

/// Trait for async middleware
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Handle one request; call `next.run(ctx)` to continue the chain
    async fn handle(&self, ctx: Context, request: RequestHelpers, next: Next) -> Result<Value>;
}

/// Continuation to the rest of the chain
pub struct Next {
    chain: Arc<[Arc<dyn Middleware>]>,
    index: usize,
    request: RequestHelpers,
    endpoint: Endpoint,
}

impl Next {
    /// Run the remaining middleware and then the endpoint
    pub async fn run(self, ctx: Context) -> Result<Value> {
        match self.chain.get(self.index).cloned() {
            Some(middleware) => {
                let request = self.request.clone();
                let next = Next {
                    index: self.index + 1,
                    ..self
                };
                middleware.handle(ctx, request, next).await
            }
            None => (self.endpoint)(ctx).await,
        }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &(self.chain.len() - self.index.min(self.chain.len())))
            .finish()
    }
}

/// Chain of middleware to execute in order
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the end of the chain
    pub fn add(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    /// Append every middleware of `other`
    pub fn extend(&mut self, other: &MiddlewareChain) {
        self.middlewares.extend(other.middlewares.iter().cloned());
    }

    /// Execute the chain around `endpoint`
    pub async fn execute<F>(&self, ctx: Context, request: RequestHelpers, endpoint: F) -> Result<Value>
    where
        F: FnOnce(Context) -> HandlerResult + Send + 'static,
    {
        let next = Next {
            chain: self.middlewares.clone().into(),
            index: 0,
            request,
            endpoint: Box::new(endpoint),
        };
        next.run(ctx).await
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl From<Vec<Arc<dyn Middleware>>> for MiddlewareChain {
    fn from(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self { middlewares }
    }
}

/// Middleware built from an async closure
pub struct FnMiddleware<F> {
    func: F,
}

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Context, RequestHelpers, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    async fn handle(&self, ctx: Context, request: RequestHelpers, next: Next) -> Result<Value> {
        (self.func)(ctx, request, next).await
    }
}

/// Create a middleware from an async closure
pub fn from_fn<F, Fut>(func: F) -> Arc<dyn Middleware>
where
    F: Fn(Context, RequestHelpers, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(FnMiddleware { func })
}

/// Middleware that only calls `next`
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

#[async_trait]
impl Middleware for Passthrough {
    async fn handle(&self, ctx: Context, _request: RequestHelpers, next: Next) -> Result<Value> {
        next.run(ctx).await
    }
}

/// Runs the rest of the chain inside an `rpc_request` span
///
/// The span records the method path and verb; the outcome is logged when
/// the chain returns.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMiddleware;

impl TracingMiddleware {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for TracingMiddleware {
    async fn handle(&self, ctx: Context, request: RequestHelpers, next: Next) -> Result<Value> {
        let span = tracing::info_span!(
            "rpc_request",
            method = %request.method(),
            verb = %request.verb(),
        );

        async move {
            tracing::debug!("Request started");
            let result = next.run(ctx).await;
            match &result {
                Ok(_) => tracing::debug!("Request completed"),
                Err(e) => tracing::warn!(error = %e, "Request failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tern_core::{Error, RpcError, Verb};

    fn request() -> RequestHelpers {
        RequestHelpers::for_test("test.method", Verb::Post)
    }

    fn marker(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Arc<dyn Middleware> {
        from_fn(move |mut ctx: Context, _request, next: Next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(format!("{}:before", name));
                ctx.insert_metadata(name, Value::Bool(true));
                let result = next.run(ctx).await;
                log.lock().push(format!("{}:after", name));
                result
            }
        })
    }

    fn endpoint<F>(f: F) -> impl FnOnce(Context) -> HandlerResult + Send + 'static
    where
        F: FnOnce(Context) -> Result<Value> + Send + 'static,
    {
        move |ctx| Box::pin(async move { f(ctx) })
    }

    #[tokio::test]
    async fn test_middleware_execution_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        chain.add(marker("marker1", Arc::clone(&log)));
        chain.add(marker("marker2", Arc::clone(&log)));

        let endpoint_log = Arc::clone(&log);
        let result = chain
            .execute(
                Context::new(),
                request(),
                endpoint(move |ctx| {
                    endpoint_log.lock().push("resolver".to_string());
                    let mut seen: Vec<_> = ctx.metadata().keys().cloned().collect();
                    seen.sort();
                    Ok(Value::List(seen.into_iter().map(Value::from).collect()))
                }),
            )
            .await
            .unwrap();

        assert_eq!(
            result,
            Value::List(vec![Value::from("marker1"), Value::from("marker2")])
        );
        assert_eq!(
            *log.lock(),
            vec![
                "marker1:before",
                "marker2:before",
                "resolver",
                "marker2:after",
                "marker1:after"
            ]
        );
    }

    #[tokio::test]
    async fn test_middleware_short_circuit() {
        let reached = Arc::new(Mutex::new(false));
        let mut chain = MiddlewareChain::new();
        chain.add(from_fn(|_ctx, _request, _next| async move {
            Ok(Value::from("short-circuited"))
        }));
        chain.add(marker("never", Arc::new(Mutex::new(Vec::new()))));

        let flag = Arc::clone(&reached);
        let result = chain
            .execute(
                Context::new(),
                request(),
                endpoint(move |_ctx| {
                    *flag.lock() = true;
                    Ok(Value::Null)
                }),
            )
            .await
            .unwrap();

        assert_eq!(result, Value::from("short-circuited"));
        assert!(!*reached.lock());
    }

    #[tokio::test]
    async fn test_empty_chain_is_passthrough() {
        let chain = MiddlewareChain::new();
        let mut ctx = Context::new();
        ctx.insert_metadata("seed", Value::from(1));

        let result = chain
            .execute(
                ctx,
                request(),
                endpoint(|ctx| Ok(ctx.get_metadata("seed").cloned().unwrap_or(Value::Null))),
            )
            .await
            .unwrap();

        assert_eq!(result, Value::from(1));
    }

    #[tokio::test]
    async fn test_middleware_error_propagates() {
        let mut chain = MiddlewareChain::new();
        chain.add(Arc::new(Passthrough));

        let result = chain
            .execute(
                Context::new(),
                request(),
                endpoint(|_ctx| Err(RpcError::forbidden("no").into())),
            )
            .await;

        assert!(matches!(result, Err(Error::Rpc(e)) if e.is_forbidden()));
    }

    #[tokio::test]
    async fn test_middleware_can_replace_result() {
        let mut chain = MiddlewareChain::new();
        chain.add(from_fn(|ctx, _request, next: Next| async move {
            match next.run(ctx).await {
                Ok(Value::Number(n)) => Ok(Value::from(n.as_i64().unwrap_or(0) * 2)),
                other => other,
            }
        }));

        let result = chain
            .execute(Context::new(), request(), endpoint(|_ctx| Ok(Value::from(21))))
            .await
            .unwrap();

        assert_eq!(result, Value::from(42));
    }

    #[tokio::test]
    async fn test_typed_context_slots() {
        #[derive(Debug, PartialEq)]
        struct User {
            id: u32,
        }

        let mut chain = MiddlewareChain::new();
        chain.add(from_fn(|mut ctx: Context, _request, next: Next| async move {
            ctx.insert(User { id: 7 });
            next.run(ctx).await
        }));

        let result = chain
            .execute(
                Context::new(),
                request(),
                endpoint(|ctx| Ok(Value::from(ctx.get::<User>().map(|u| u.id).unwrap_or(0)))),
            )
            .await
            .unwrap();

        assert_eq!(result, Value::from(7u32));
    }

    #[tokio::test]
    async fn test_tracing_middleware() {
        let mut chain = MiddlewareChain::new();
        chain.add(Arc::new(TracingMiddleware::new()));

        let result = chain
            .execute(Context::new(), request(), endpoint(|_ctx| Ok(Value::from("ok"))))
            .await;

        assert_eq!(result.unwrap(), Value::from("ok"));
    }
}
