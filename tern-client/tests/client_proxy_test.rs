//! Client proxy integration tests
//!
//! Every call here goes through the real codec, verb selection, server
//! dispatch and error reconstruction, with the server running in-process.

mod common;

use common::{date_of_birth, local_builder, local_client, recording_client, URL};
use parking_lot::Mutex;
use std::sync::Arc;
use tern_client::{CallLog, CallOptions};
use tern_core::{
    is_bad_request, is_internal_server_error, is_not_found, is_unauthorized, Error, ErrorKind,
    Value, Verb,
};

fn id(n: i64) -> Value {
    Value::object(vec![("id", Value::from(n))])
}

#[tokio::test]
async fn test_get_user_keeps_date_and_set() {
    let (client, transport) = recording_client();

    let user = client.method("users").get("getUser").call(id(1)).await.unwrap();

    assert_eq!(transport.last().verb, Verb::Get);
    assert_eq!(user.get("name").and_then(Value::as_str), Some("Ada Lovelace"));
    assert_eq!(user.get("dateOfBirth").and_then(Value::as_date), Some(&date_of_birth()));

    let tags = user.get("tags").and_then(Value::as_set).unwrap();
    let tags: Vec<_> = tags.iter().filter_map(Value::as_str).collect();
    assert_eq!(tags, vec!["admin", "math"]);
}

#[tokio::test]
async fn test_verb_boundary() {
    let (client, transport) = recording_client();
    let prefix = format!("{}?method=getThing&input=%22", URL).len() + "%22".len();

    let input = Value::from("a".repeat(999 - prefix));
    assert_eq!(client.call("getThing", input.clone()).await.unwrap(), input);
    let request = transport.last();
    assert_eq!(request.verb, Verb::Get);
    assert_eq!(request.url.len(), 999);

    let input = Value::from("a".repeat(1001 - prefix));
    assert_eq!(client.call("getThing", input.clone()).await.unwrap(), input);
    assert_eq!(transport.last().verb, Verb::Post);

    client.call("saveThing", Value::from("a")).await.unwrap();
    let request = transport.last();
    assert_eq!(request.verb, Verb::Post);
    assert_eq!(request.url, URL);
}

#[tokio::test]
async fn test_nested_services() {
    let (client, transport) = recording_client();

    let roles = client.call("users.admin.listRoles", Value::Null).await.unwrap();
    assert_eq!(transport.last().verb, Verb::Get);
    assert_eq!(
        roles,
        Value::List(vec![Value::from("owner"), Value::from("viewer")])
    );

    let saved = client
        .method("users")
        .get("saveUser")
        .call(Value::object(vec![("name", Value::from("Grace"))]))
        .await
        .unwrap();
    assert_eq!(transport.last().verb, Verb::Post);
    assert_eq!(saved.get("name").and_then(Value::as_str), Some("Grace"));
}

#[tokio::test]
async fn test_classified_errors_reach_the_caller() {
    let client = local_client();

    let err = client.call("users.getUser", id(9)).await.unwrap_err();
    assert!(is_not_found(&err));
    assert_eq!(err.as_rpc().unwrap().message, "No user 9");
    assert_eq!(err.as_rpc().unwrap().status_code, 404);

    let err = client.call("users.getUser", Value::Null).await.unwrap_err();
    assert!(is_bad_request(&err));
    assert_eq!(err.as_rpc().unwrap().message, "id is required");

    let err = client.call("session.getCurrent", Value::Null).await.unwrap_err();
    assert!(is_unauthorized(&err));
    assert_eq!(err.as_rpc().unwrap().status_code, 401);
    assert_eq!(err.as_rpc().unwrap().message, "Please log in");
}

#[tokio::test]
async fn test_unknown_failures_are_generic() {
    let err = local_client().call("explode", Value::Null).await.unwrap_err();

    assert!(is_internal_server_error(&err));
    let rpc = err.as_rpc().unwrap();
    assert_eq!(rpc.status_code, 500);
    assert_eq!(rpc.message, "Internal server error");
}

#[tokio::test]
async fn test_method_not_found() {
    let err = local_client().call("users.admin", Value::Null).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::MethodNotFound));
}

#[tokio::test]
async fn test_cookies_round_trip() {
    let logs = Arc::new(Mutex::new(Vec::<CallLog>::new()));
    let sink = Arc::clone(&logs);
    let client = local_builder()
        .logger(move |log: &CallLog| sink.lock().push(log.clone()))
        .build()
        .unwrap();

    client.call("session.login", Value::Null).await.unwrap();
    let set_cookie = logs.lock()[0]
        .response
        .as_ref()
        .and_then(|r| r.header("set-cookie").map(str::to_string))
        .unwrap();
    assert_eq!(set_cookie, "session=token-1; Path=/; HttpOnly");

    let cookie = set_cookie.split(';').next().unwrap().to_string();
    let current = client
        .call_with(
            "session.getCurrent",
            Value::Null,
            CallOptions::new().header("Cookie", cookie),
        )
        .await
        .unwrap();
    assert_eq!(current, Value::from("token-1"));

    client.call("session.logout", Value::Null).await.unwrap();
    let cleared = logs.lock()[2]
        .response
        .as_ref()
        .and_then(|r| r.header("set-cookie").map(str::to_string))
        .unwrap();
    assert_eq!(cleared, "session=; Max-Age=0; Path=/");
}

#[tokio::test]
async fn test_logger_called_once_per_call() {
    let logs = Arc::new(Mutex::new(Vec::<CallLog>::new()));
    let sink = Arc::clone(&logs);
    let client = local_builder()
        .logger(move |log: &CallLog| sink.lock().push(log.clone()))
        .build()
        .unwrap();

    client.call("users.getUser", id(1)).await.unwrap();
    client.call("users.getUser", id(2)).await.unwrap_err();

    let logs = logs.lock();
    assert_eq!(logs.len(), 2);

    assert!(logs[0].ok);
    assert_eq!(logs[0].verb, Verb::Get);
    assert_eq!(logs[0].method, "users.getUser");
    assert!(logs[0].url.starts_with(URL));
    assert!(logs[0].result.is_ok());

    assert!(!logs[1].ok);
    assert_eq!(logs[1].response.as_ref().map(|r| r.status), Some(404));
    assert!(matches!(logs[1].result, Err(Error::Rpc(_))));
}

#[tokio::test]
async fn test_typed_calls() {
    #[derive(serde::Serialize)]
    struct Lookup {
        id: i64,
    }

    #[derive(serde::Deserialize)]
    struct User {
        name: String,
        #[serde(rename = "dateOfBirth")]
        date_of_birth: String,
    }

    let user: User = local_client()
        .call_typed("users.getUser", Lookup { id: 1 })
        .await
        .unwrap();
    assert_eq!(user.name, "Ada Lovelace");
    assert_eq!(user.date_of_birth, "1815-12-10T00:00:00.000Z");
}
