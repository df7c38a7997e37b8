//! End-to-end tests driving two spawned engines wired back to back: each
//! connection's sink feeds the other side's inbound frames, which is the
//! whole protocol path a real transport would exercise.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use jsonrpc_duplex::{
    BatchItem, CallError, EngineError, HandlerError, RequestError, RequestId, RpcBuilder,
    RpcConnection, SendError,
};

const CALL_TIMEOUT: Duration = Duration::from_secs(5);
const SHORT_TIMEOUT: Duration = Duration::from_millis(50);

fn server_builder() -> RpcBuilder {
    RpcBuilder::new()
        .method_fn("echo", |params| async move {
            Ok(params.unwrap_or(Value::Null))
        })
        .method_fn("add", |params| async move {
            let params = params.ok_or(HandlerError::InvalidParams)?;
            let a = params["a"].as_i64().ok_or(HandlerError::InvalidParams)?;
            let b = params["b"].as_i64().ok_or(HandlerError::InvalidParams)?;
            Ok(json!(a + b))
        })
        .method_fn("fail", |_| async {
            Err(HandlerError::custom(1001, "application failure", None))
        })
}

/// Spawn `left` and `right` and cross-wire them: whatever one sends, the
/// other receives as an inbound text frame.
fn link(left: RpcBuilder, right: RpcBuilder) -> (RpcConnection, RpcConnection) {
    let (left_out_tx, mut left_out_rx) = mpsc::unbounded_channel::<String>();
    let (right_out_tx, mut right_out_rx) = mpsc::unbounded_channel::<String>();

    let left = left.spawn(move |text: String| {
        left_out_tx.send(text).map_err(|_| SendError::new("peer gone"))
    });
    let right = right.spawn(move |text: String| {
        right_out_tx.send(text).map_err(|_| SendError::new("peer gone"))
    });

    let right_frames = right.frames();
    tokio::spawn(async move {
        while let Some(text) = left_out_rx.recv().await {
            if right_frames.text(text).await.is_err() {
                break;
            }
        }
    });
    let left_frames = left.frames();
    tokio::spawn(async move {
        while let Some(text) = right_out_rx.recv().await {
            if left_frames.text(text).await.is_err() {
                break;
            }
        }
    });

    (left, right)
}

#[tokio::test]
async fn call_round_trip() {
    let (caller, _server) = link(RpcBuilder::new(), server_builder());
    let client = caller.client();

    let result = client
        .call("echo", Some(json!({"hello": "world"})), CALL_TIMEOUT)
        .await
        .unwrap();
    assert_eq!(result, json!({"hello": "world"}));

    let sum: i64 = client
        .call_as("add", Some(json!({"a": 20, "b": 22})), CALL_TIMEOUT)
        .await
        .unwrap();
    assert_eq!(sum, 42);
}

#[tokio::test]
async fn concurrent_calls_correlate() {
    let (caller, _server) = link(RpcBuilder::new(), server_builder());
    let client = caller.client();

    let mut handles = Vec::new();
    for n in 0..16i64 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client
                .call_as::<i64>("add", Some(json!({"a": n, "b": 1})), CALL_TIMEOUT)
                .await
        }));
    }
    for (n, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap().unwrap(), n as i64 + 1);
    }
}

#[tokio::test]
async fn peer_error_surfaces_to_caller() {
    let (caller, _server) = link(RpcBuilder::new(), server_builder());
    let client = caller.client();

    match client.call("fail", None, CALL_TIMEOUT).await {
        Err(RequestError::Returned(error)) => {
            assert_eq!(error.code(), Some(1001));
            assert_eq!(error.message(), "application failure");
        }
        other => panic!("expected returned error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn unknown_method_surfaces_method_name() {
    let (caller, _server) = link(RpcBuilder::new(), server_builder());
    let client = caller.client();

    match client.call("no_such_method", None, CALL_TIMEOUT).await {
        Err(RequestError::Returned(jsonrpc_duplex::ErrorData::Object(obj))) => {
            assert_eq!(obj.code, -32601);
            assert_eq!(obj.message, "Method not found");
            assert_eq!(obj.data, Some(json!("no_such_method")));
        }
        other => panic!("expected method-not-found, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn result_decode_failure_is_caller_local() {
    let (caller, _server) = link(RpcBuilder::new(), server_builder());
    let client = caller.client();

    let outcome: Result<i64, _> = client
        .call_as("echo", Some(json!("not a number")), CALL_TIMEOUT)
        .await;
    assert!(matches!(outcome, Err(RequestError::Decode(_))));

    // The connection is still usable afterwards.
    let echoed = client.call("echo", Some(json!(1)), CALL_TIMEOUT).await.unwrap();
    assert_eq!(echoed, json!(1));
}

#[tokio::test]
async fn call_times_out_against_a_silent_peer() {
    // A sink that drops every frame: requests go nowhere, no response ever.
    let connection = RpcBuilder::new().spawn(|_text: String| -> Result<(), SendError> { Ok(()) });
    let client = connection.client();

    match client.call("void", None, SHORT_TIMEOUT).await {
        Err(RequestError::Call(CallError::Timeout)) => {}
        other => panic!("expected timeout, got {:?}", other.map(|_| ())),
    }

    // A response arriving after the caller reaped its entry is logged and
    // discarded; the engine keeps running.
    connection
        .frames()
        .text(r#"{"jsonrpc":"2.0","id":"stale","result":1}"#)
        .await
        .unwrap();
    client.close().await.unwrap();
    assert!(connection.join().await.is_ok());
}

#[tokio::test]
async fn notifications_reach_handler_and_produce_no_frames() {
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<Value>();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    let server = RpcBuilder::new()
        .notification_fn("log", move |params| {
            let seen_tx = seen_tx.clone();
            async move {
                let _ = seen_tx.send(params.unwrap_or(Value::Null));
            }
        })
        .spawn(move |text: String| out_tx.send(text).map_err(|_| SendError::new("gone")));

    server
        .frames()
        .text(r#"{"jsonrpc":"2.0","method":"log","params":{"level":"info"}}"#)
        .await
        .unwrap();
    // An unknown notification is only logged.
    server
        .frames()
        .text(r#"{"jsonrpc":"2.0","method":"unheard"}"#)
        .await
        .unwrap();

    assert_eq!(seen_rx.recv().await, Some(json!({"level": "info"})));
    server.client().close().await.unwrap();
    server.join().await.unwrap();
    assert!(out_rx.try_recv().is_err(), "notifications must not be answered");
}

#[tokio::test]
async fn batch_call_round_trip() {
    let (caller, _server) = link(RpcBuilder::new(), server_builder());
    let client = caller.client();

    let results = client
        .call_batch(
            vec![
                BatchItem::call_with_id(
                    RequestId::Number(1),
                    "add",
                    Some(json!({"a": 1, "b": 2})),
                ),
                BatchItem::notify("log", None),
                BatchItem::call_with_id(RequestId::Number(2), "fail", None),
            ],
            CALL_TIMEOUT,
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results.get(&RequestId::Number(1)), Some(&Ok(json!(3))));
    match results.get(&RequestId::Number(2)) {
        Some(Err(error)) => assert_eq!(error.code(), Some(1001)),
        other => panic!("expected error outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn all_notification_batch_resolves_empty() {
    let (caller, _server) = link(RpcBuilder::new(), server_builder());
    let results = caller
        .client()
        .call_batch(
            vec![BatchItem::notify("a", None), BatchItem::notify("b", None)],
            CALL_TIMEOUT,
        )
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn binary_frames_get_parse_error_reply() {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let server = RpcBuilder::new()
        .spawn(move |text: String| out_tx.send(text).map_err(|_| SendError::new("gone")));

    server.frames().binary(vec![0x01, 0x02]).await.unwrap();

    let reply: Value = serde_json::from_str(&out_rx.recv().await.unwrap()).unwrap();
    assert_eq!(
        reply,
        json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": {
                "code": -32700,
                "message": "Parse error",
                "data": "binary frames are unsupported"
            }
        })
    );
}

#[tokio::test]
async fn send_failure_stops_the_engine_abnormally() {
    let connection = RpcBuilder::new()
        .spawn(|_text: String| -> Result<(), SendError> { Err(SendError::new("broken pipe")) });
    let client = connection.client();

    match client.call("anything", None, CALL_TIMEOUT).await {
        Err(RequestError::Call(CallError::Closed)) => {}
        other => panic!("expected closed, got {:?}", other.map(|_| ())),
    }

    match connection.join().await {
        Err(EngineError::SocketClosed(_)) => {}
        other => panic!("expected abnormal stop, got {:?}", other),
    }
}

#[tokio::test]
async fn close_stops_the_engine_normally() {
    let (caller, server) = link(RpcBuilder::new(), server_builder());
    caller.client().close().await.unwrap();
    assert!(caller.join().await.is_ok());

    server.client().close().await.unwrap();
    assert!(server.join().await.is_ok());
}
