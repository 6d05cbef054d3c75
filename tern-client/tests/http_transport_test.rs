//! End-to-end tests over a real socket

mod common;

use common::sample_server;
use std::net::SocketAddr;
use tern_client::RpcClient;
use tern_core::{is_unauthorized, Error, Value};
use tern_server::HttpServer;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

async fn start() -> (SocketAddr, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http = HttpServer::new(listener, sample_server());
    let addr = http.local_addr().unwrap();
    let shutdown = http.shutdown_token();
    tokio::spawn(http.run());
    (addr, shutdown)
}

#[tokio::test]
async fn test_calls_over_http() {
    let (addr, shutdown) = start().await;
    let client = RpcClient::new(format!("http://{}/rpc", addr)).unwrap();

    let user = client
        .call("users.getUser", Value::object(vec![("id", Value::from(1))]))
        .await
        .unwrap();
    assert!(user.get("dateOfBirth").and_then(Value::as_date).is_some());
    assert!(user.get("tags").and_then(Value::as_set).is_some());

    let saved = client
        .call("users.saveUser", Value::object(vec![("name", Value::from("Grace"))]))
        .await
        .unwrap();
    assert_eq!(saved.get("name").and_then(Value::as_str), Some("Grace"));

    let err = client.call("session.getCurrent", Value::Null).await.unwrap_err();
    assert!(is_unauthorized(&err));

    shutdown.cancel();
}

#[tokio::test]
async fn test_default_headers_are_sent() {
    let (addr, shutdown) = start().await;
    let client = RpcClient::builder(format!("http://{}/rpc", addr))
        .default_header("Cookie", "session=abc")
        .build()
        .unwrap();

    let current = client.call("session.getCurrent", Value::Null).await.unwrap();
    assert_eq!(current, Value::from("abc"));

    shutdown.cancel();
}

#[tokio::test]
async fn test_unreachable_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = RpcClient::new(format!("http://{}/rpc", addr)).unwrap();
    let err = client.call("getThing", Value::Null).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}
