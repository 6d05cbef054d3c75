//! Example serving a small account service and calling it over HTTP
//!
//! Run with `cargo run --example accounts`.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tern::server::{Context, Middleware, Next, RequestHelpers, TracingMiddleware};
use tern::{accept_any, resolver_fn, CallOptions, Method, RpcClient, RpcError, Server, Value};

/// Rejects calls without an `x-api-key` header
struct ApiKeyMiddleware {
    key: String,
}

#[async_trait]
impl Middleware for ApiKeyMiddleware {
    async fn handle(&self, mut ctx: Context, request: RequestHelpers, next: Next) -> tern::Result<Value> {
        match request.header("x-api-key") {
            Some(key) if key == self.key => {
                ctx.insert_metadata("caller", Value::from("demo"));
                next.run(ctx).await
            }
            _ => Err(RpcError::unauthorized("Missing or invalid API key").into()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let http = Server::builder()
        .bind_str("127.0.0.1:0")?
        .use_middleware(Arc::new(TracingMiddleware::new()))
        .use_middleware(Arc::new(ApiKeyMiddleware {
            key: "secret".to_string(),
        }))
        .service(|root| {
            root.namespace("users", |users| {
                users.method(
                    "getUser",
                    Method::new(
                        accept_any(),
                        resolver_fn(|input: Value, ctx: Context, _| async move {
                            let id = input.get("id").and_then(Value::as_i64).unwrap_or_default();
                            if id != 1 {
                                return Err(RpcError::not_found(format!("No user {}", id)).into());
                            }
                            let born = Utc
                                .with_ymd_and_hms(1815, 12, 10, 0, 0, 0)
                                .single()
                                .map(Value::date)
                                .unwrap_or(Value::Null);
                            Ok(Value::object(vec![
                                ("name", Value::from("Ada Lovelace")),
                                ("dateOfBirth", born),
                                ("tags", Value::set(vec![Value::from("admin"), Value::from("math")])),
                                ("caller", ctx.get_metadata("caller").cloned().unwrap_or(Value::Null)),
                            ]))
                        }),
                    ),
                )
            })
        })
        .logger(|line| println!("[server] {}", line.kind()))
        .listen()
        .await?;

    let addr = http.local_addr()?;
    let shutdown = http.shutdown_token();
    let server_task = tokio::spawn(http.run());

    let client = RpcClient::builder(format!("http://{}/rpc", addr))
        .logger(|log| println!("[client] {} {} ok={} in {:?}", log.verb, log.method, log.ok, log.elapsed))
        .build()?;

    let with_key = || CallOptions::new().header("x-api-key", "secret");
    let get_user = client.method("users").get("getUser");

    let user = get_user
        .call_with(Value::object(vec![("id", Value::from(1))]), with_key())
        .await?;
    println!("user: {:?}", user);
    println!("born: {:?}", user.get("dateOfBirth").and_then(Value::as_date));

    match get_user.call(Value::object(vec![("id", Value::from(1))])).await {
        Err(e) if tern::core::is_unauthorized(&e) => println!("rejected without key: {}", e),
        other => println!("unexpected: {:?}", other),
    }

    match get_user
        .call_with(Value::object(vec![("id", Value::from(2))]), with_key())
        .await
    {
        Err(e) => println!("lookup failed as expected: {}", e),
        Ok(v) => println!("unexpected: {:?}", v),
    }

    shutdown.cancel();
    server_task.await??;
    Ok(())
}
