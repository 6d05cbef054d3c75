//! Cancellation integration tests

mod common;

use common::{local_builder, local_client};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tern_client::{CallLog, CallOptions};
use tern_core::{Error, Value};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_abort_rejects_promptly() {
    let client = local_client();
    let signal = CancellationToken::new();

    let trigger = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        client.call_with("getSlow", Value::Null, CallOptions::new().abort(signal)),
    )
    .await
    .expect("abort did not interrupt the call");

    assert!(matches!(result, Err(Error::Aborted)));
}

#[tokio::test]
async fn test_later_calls_unaffected() {
    let client = local_client();
    let signal = CancellationToken::new();
    signal.cancel();

    let aborted = client
        .call_with("users.getUser", Value::Null, CallOptions::new().abort(signal))
        .await;
    assert!(matches!(aborted, Err(Error::Aborted)));

    let roles = client.call("users.admin.listRoles", Value::Null).await.unwrap();
    assert!(roles.as_list().is_some());

    let unrelated = CancellationToken::new();
    let thing = client
        .call_with("getThing", Value::from(3), CallOptions::new().abort(unrelated))
        .await
        .unwrap();
    assert_eq!(thing, Value::from(3));
}

#[tokio::test]
async fn test_aborted_call_is_logged_without_response() {
    let logs = Arc::new(Mutex::new(Vec::<CallLog>::new()));
    let sink = Arc::clone(&logs);
    let client = local_builder()
        .logger(move |log: &CallLog| sink.lock().push(log.clone()))
        .build()
        .unwrap();

    let signal = CancellationToken::new();
    signal.cancel();
    let _ = client
        .call_with("getSlow", Value::Null, CallOptions::new().abort(signal))
        .await;

    let logs = logs.lock();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].response.is_none());
    assert!(!logs[0].ok);
    assert!(matches!(logs[0].result, Err(Error::Aborted)));
}
