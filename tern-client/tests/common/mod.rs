//! Shared fixtures for client integration tests
//!
//! A small account service served in-process through `LocalTransport`, and a
//! transport wrapper that records every request it forwards.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tern_client::{ClientBuilder, RpcClient};
use tern_core::{HttpRequest, HttpResponse, Result, RpcError, Transport, Value};
use tern_server::{
    accept_any, middleware, resolver_fn, validator_fn, Context, CookieOptions, LocalTransport,
    Method, Next, RequestHelpers, Server,
};

pub const URL: &str = "http://accounts.test/rpc";

/// Session token carried from the auth middleware to resolvers
pub struct Session(pub String);

fn require_session() -> Arc<dyn tern_server::Middleware> {
    middleware::from_fn(|mut ctx: Context, request: RequestHelpers, next: Next| async move {
        let Some(token) = request.cookie("session") else {
            return Err(RpcError::unauthorized("Please log in").into());
        };
        ctx.insert(Session(token));
        next.run(ctx).await
    })
}

fn get_user() -> Method {
    Method::new(
        validator_fn(|input: Value| async move {
            match input.get("id").and_then(Value::as_i64) {
                Some(_) => Ok(input),
                None => Err(RpcError::bad_request("id is required").into()),
            }
        }),
        resolver_fn(|input: Value, _, _| async move {
            let id = input.get("id").and_then(Value::as_i64).unwrap_or_default();
            if id != 1 {
                return Err(RpcError::not_found(format!("No user {}", id)).into());
            }
            Ok(Value::object(vec![
                ("id", Value::from(1)),
                ("name", Value::from("Ada Lovelace")),
                ("dateOfBirth", Value::date(date_of_birth())),
                ("tags", Value::set(vec![Value::from("admin"), Value::from("math")])),
            ]))
        }),
    )
}

pub fn date_of_birth() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(1815, 12, 10, 0, 0, 0).unwrap()
}

/// The account service used by every client test
pub fn sample_server() -> Server {
    Server::builder()
        .service(|root| {
            root.namespace("users", |users| {
                users
                    .method("getUser", get_user())
                    .method(
                        "saveUser",
                        Method::new(accept_any(), resolver_fn(|input, _, _| async move { Ok(input) })),
                    )
                    .namespace("admin", |admin| {
                        admin.method(
                            "listRoles",
                            Method::new(
                                accept_any(),
                                resolver_fn(|_, _, _| async {
                                    Ok(Value::List(vec![Value::from("owner"), Value::from("viewer")]))
                                }),
                            ),
                        )
                    })
            })
            .namespace("session", |session| {
                session
                    .method(
                        "login",
                        Method::new(
                            accept_any(),
                            resolver_fn(|_, _, request: RequestHelpers| async move {
                                request.set_cookie(
                                    "session",
                                    "token-1",
                                    CookieOptions::new().path("/").http_only(),
                                );
                                Ok(Value::Bool(true))
                            }),
                        ),
                    )
                    .method(
                        "logout",
                        Method::new(
                            accept_any(),
                            resolver_fn(|_, _, request: RequestHelpers| async move {
                                request.delete_cookie("session", CookieOptions::new().path("/"));
                                Ok(Value::Null)
                            }),
                        ),
                    )
                    .method(
                        "getCurrent",
                        Method::new(
                            accept_any(),
                            resolver_fn(|_, ctx: Context, _| async move {
                                let token = ctx.get::<Session>().map(|s| s.0.clone());
                                Ok(token.map(Value::from).unwrap_or(Value::Null))
                            }),
                        )
                        .with_middleware(require_session()),
                    )
            })
            .method(
                "getThing",
                Method::new(accept_any(), resolver_fn(|input, _, _| async move { Ok(input) })),
            )
            .method(
                "saveThing",
                Method::new(accept_any(), resolver_fn(|input, _, _| async move { Ok(input) })),
            )
            .method(
                "getSlow",
                Method::new(
                    accept_any(),
                    resolver_fn(|_, _, _| async {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        Ok(Value::from("finally"))
                    }),
                ),
            )
            .method(
                "explode",
                Method::new(
                    accept_any(),
                    resolver_fn(|_, _, _| async {
                        Err(tern_core::Error::internal("connection string: postgres://secret"))
                    }),
                ),
            )
        })
        .build()
        .unwrap()
}

/// Forwards to an inner transport and remembers every request
#[derive(Clone)]
pub struct Recording<T> {
    inner: T,
    pub requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl<T> Recording<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn last(&self) -> HttpRequest {
        self.requests.lock().last().cloned().unwrap()
    }
}

#[async_trait]
impl<T: Transport> Transport for Recording<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().push(request.clone());
        self.inner.send(request).await
    }
}

/// A client builder wired to the sample service in-process
pub fn local_builder() -> ClientBuilder {
    ClientBuilder::new(URL).transport(LocalTransport::new(sample_server()))
}

pub fn local_client() -> RpcClient {
    local_builder().build().unwrap()
}

/// A recording client over the sample service
pub fn recording_client() -> (RpcClient, Recording<LocalTransport>) {
    let transport = Recording::new(LocalTransport::new(sample_server()));
    let client = ClientBuilder::new(URL)
        .transport(transport.clone())
        .build()
        .unwrap();
    (client, transport)
}
