//! Method descriptors: validator, resolver and per-method middleware
//!
//! Every callable method is a [`Method`], built once when the service tree is
//! defined and never changed afterwards. A method has three parts:
//!
//! - **Validator**: turns the raw decoded input into the input the resolver
//!   expects, or rejects it
//! - **Resolver**: produces the output from the validated input, the
//!   context built by middleware and the request helpers
//! - **Middleware**: an optional chain run around the resolver
//!
//! # Writing Validators
//!
//! A validator failure that is already classified (an `RpcError`) reaches the
//! caller unchanged. Any other failure becomes `BadRequest` carrying the
//! failure's message.
//!
//! # Writing Resolvers
//!
//! Classified failures reach the caller unchanged. Any other failure is
//! logged on the server and the caller sees `InternalServerError` with a
//! generic message.
//!
//! # Examples
//!
//! ```rust
//! use tern_server::{validate_as, resolver_fn, Method};
//! use tern_core::{RpcError, Value};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct GetUser { id: u64 }
//!
//! let method = Method::new(
//!     validate_as::<GetUser>(),
//!     resolver_fn(|input: Value, _ctx, _request| async move {
//!         match input.get("id").and_then(Value::as_i64) {
//!             Some(1) => Ok(Value::object(vec![("name", Value::from("Ada"))])),
//!             _ => Err(RpcError::not_found("No such user").into()),
//!         }
//!     }),
//! );
//! assert!(method.middleware().is_empty());
//! ```

use crate::exchange::RequestHelpers;
use crate::middleware::{Context, Middleware, MiddlewareChain};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use tern_core::{from_value, to_value, Error, Result, RpcError, Value};

/// Boxed future returned by validators, resolvers and chain endpoints
pub type HandlerResult = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// Checks and normalizes a method's input
pub trait Validator: Send + Sync {
    fn validate(&self, input: Value) -> HandlerResult;
}

/// Produces a method's output
pub trait Resolver: Send + Sync {
    fn resolve(&self, input: Value, ctx: Context, request: RequestHelpers) -> HandlerResult;
}

/// Validator backed by an async closure
pub struct AsyncValidator<F> {
    func: F,
}

impl<F, Fut> Validator for AsyncValidator<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    fn validate(&self, input: Value) -> HandlerResult {
        Box::pin((self.func)(input))
    }
}

/// Create a validator from an async closure
pub fn validator_fn<F, Fut>(func: F) -> Arc<dyn Validator>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(AsyncValidator { func })
}

/// Resolver backed by an async closure
pub struct AsyncResolver<F> {
    func: F,
}

impl<F, Fut> Resolver for AsyncResolver<F>
where
    F: Fn(Value, Context, RequestHelpers) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    fn resolve(&self, input: Value, ctx: Context, request: RequestHelpers) -> HandlerResult {
        Box::pin((self.func)(input, ctx, request))
    }
}

/// Create a resolver from an async closure
pub fn resolver_fn<F, Fut>(func: F) -> Arc<dyn Resolver>
where
    F: Fn(Value, Context, RequestHelpers) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(AsyncResolver { func })
}

/// Create a resolver over serde types
///
/// The input is deserialized into `P` (a mismatch is a `BadRequest`) and the
/// output serialized from `R`. Extended values are flattened on the way in;
/// use [`resolver_fn`] to return dates, sets or maps with their types intact.
pub fn typed_resolver<P, R, F, Fut>(func: F) -> Arc<dyn Resolver>
where
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    F: Fn(P, Context, RequestHelpers) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    let func = Arc::new(func);

    resolver_fn(move |input: Value, ctx, request| {
        let func = Arc::clone(&func);
        async move {
            let params: P = from_value(&input)
                .map_err(|e| Error::from(RpcError::bad_request(e.to_string())))?;
            let output = func(params, ctx, request).await?;
            to_value(output)
        }
    })
}

/// Accepts any input unchanged
pub struct AcceptAny;

impl Validator for AcceptAny {
    fn validate(&self, input: Value) -> HandlerResult {
        Box::pin(async move { Ok(input) })
    }
}

pub fn accept_any() -> Arc<dyn Validator> {
    Arc::new(AcceptAny)
}

/// Accepts only `Null` (an absent input)
pub struct NoInput;

impl Validator for NoInput {
    fn validate(&self, input: Value) -> HandlerResult {
        Box::pin(async move {
            if input.is_null() {
                Ok(Value::Null)
            } else {
                Err(RpcError::bad_request("This method takes no input").into())
            }
        })
    }
}

pub fn no_input() -> Arc<dyn Validator> {
    Arc::new(NoInput)
}

/// Validates that the input deserializes into `T`, then passes it on unchanged
pub struct ValidateAs<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned + 'static> Validator for ValidateAs<T> {
    fn validate(&self, input: Value) -> HandlerResult {
        Box::pin(async move {
            from_value::<T>(&input).map_err(|e| Error::from(RpcError::bad_request(e.to_string())))?;
            Ok(input)
        })
    }
}

pub fn validate_as<T: DeserializeOwned + 'static>() -> Arc<dyn Validator> {
    Arc::new(ValidateAs::<T> {
        _marker: PhantomData,
    })
}

/// An immutable method descriptor
#[derive(Clone)]
pub struct Method {
    validator: Arc<dyn Validator>,
    resolver: Arc<dyn Resolver>,
    middleware: MiddlewareChain,
}

impl Method {
    pub fn new(validator: Arc<dyn Validator>, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            validator,
            resolver,
            middleware: MiddlewareChain::new(),
        }
    }

    /// Append a middleware to this method's chain
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.add(middleware);
        self
    }

    pub fn validator(&self) -> &Arc<dyn Validator> {
        &self.validator
    }

    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    pub fn middleware(&self) -> &MiddlewareChain {
        &self.middleware
    }
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Method")
            .field("middleware", &self.middleware.len())
            .finish()
    }
}
