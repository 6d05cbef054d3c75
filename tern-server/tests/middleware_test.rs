//! Middleware integration tests

use std::sync::Arc;
use tern_core::{codec, ErrorBody, HttpRequest, RpcError, Value};
use tern_server::{
    accept_any, middleware, resolver_fn, Context, Method, Next, RequestHelpers, Server,
    TracingMiddleware,
};

struct CurrentUser(String);

fn auth() -> Arc<dyn tern_server::Middleware> {
    middleware::from_fn(|mut ctx: Context, request: RequestHelpers, next: Next| async move {
        match request.cookie("session").as_deref() {
            Some("valid") => {
                ctx.insert(CurrentUser("ada".to_string()));
                next.run(ctx).await
            }
            _ => Err(RpcError::unauthorized("Please log in").into()),
        }
    })
}

fn server() -> Server {
    Server::builder()
        .use_middleware(Arc::new(TracingMiddleware::new()))
        .service(|root| {
            root.method(
                "getPublic",
                Method::new(accept_any(), resolver_fn(|_, _, _| async { Ok(Value::from("open")) })),
            )
            .method(
                "getProfile",
                Method::new(
                    accept_any(),
                    resolver_fn(|_, ctx: Context, _| async move {
                        let user = ctx.get::<CurrentUser>().map(|u| u.0.clone());
                        Ok(user.map(Value::from).unwrap_or(Value::Null))
                    }),
                )
                .with_middleware(auth()),
            )
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_method_middleware_only_guards_its_method() {
    let server = server();

    let response = server
        .call(HttpRequest::get("http://localhost/?method=getPublic"))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(codec::decode(&response.body).unwrap(), Value::from("open"));
}

#[tokio::test]
async fn test_short_circuit_keeps_classified_error() {
    let response = server()
        .call(HttpRequest::get("http://localhost/?method=getProfile"))
        .await;

    assert_eq!(response.status, 401);
    let body: ErrorBody = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body.error.message, "Please log in");
}

#[tokio::test]
async fn test_context_reaches_resolver() {
    let response = server()
        .call(HttpRequest::get("http://localhost/?method=getProfile").with_header("Cookie", "session=valid"))
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "\"ada\"");
}

#[tokio::test]
async fn test_middleware_can_replace_result() {
    let wrap = middleware::from_fn(|ctx: Context, _request, next: Next| async move {
        let inner = next.run(ctx).await?;
        Ok(Value::object(vec![("wrapped", inner)]))
    });

    let server = Server::builder()
        .use_middleware(wrap)
        .service(|root| {
            root.method(
                "getValue",
                Method::new(accept_any(), resolver_fn(|_, _, _| async { Ok(Value::from(1)) })),
            )
        })
        .build()
        .unwrap();

    let response = server
        .call(HttpRequest::get("http://localhost/?method=getValue"))
        .await;
    assert_eq!(response.body, "{\"wrapped\":1}");
}
