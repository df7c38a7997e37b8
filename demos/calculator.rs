//! Calculator over an in-process loopback.
//!
//! Two engines are wired back to back: one registers the arithmetic
//! handlers, the other issues calls against it. The same code works over
//! any transport that can deliver text frames in both directions.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use jsonrpc_duplex::{BatchItem, HandlerError, RequestId, RpcBuilder, RpcConnection, SendError};

fn calculator() -> RpcBuilder {
    RpcBuilder::new()
        .method_fn("add", |params| async move {
            let (a, b) = operands(params)?;
            Ok(json!(a + b))
        })
        .method_fn("subtract", |params| async move {
            let (a, b) = operands(params)?;
            Ok(json!(a - b))
        })
        .method_fn("divide", |params| async move {
            let (a, b) = operands(params)?;
            if b == 0.0 {
                return Err(HandlerError::custom(1, "division by zero", None));
            }
            Ok(json!(a / b))
        })
        .notification_fn("shutdown_soon", |_| async {
            println!("server: shutdown requested");
        })
}

fn operands(params: Option<Value>) -> Result<(f64, f64), HandlerError> {
    let params = params.ok_or(HandlerError::InvalidParams)?;
    let a = params["a"].as_f64().ok_or(HandlerError::InvalidParams)?;
    let b = params["b"].as_f64().ok_or(HandlerError::InvalidParams)?;
    Ok((a, b))
}

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

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let timeout = Duration::from_secs(5);
    let (caller, server) = link(RpcBuilder::new(), calculator());
    let client = caller.client();

    let sum: f64 = client
        .call_as("add", Some(json!({"a": 5, "b": 3})), timeout)
        .await
        .expect("add failed");
    println!("5 + 3 = {}", sum);

    let difference: f64 = client
        .call_as("subtract", Some(json!({"a": 10, "b": 4})), timeout)
        .await
        .expect("subtract failed");
    println!("10 - 4 = {}", difference);

    match client.call("divide", Some(json!({"a": 1, "b": 0})), timeout).await {
        Err(err) => println!("1 / 0 -> {}", err),
        Ok(value) => println!("1 / 0 -> {} (unexpected)", value),
    }

    match client.call("multiply", Some(json!({"a": 2, "b": 3})), timeout).await {
        Err(err) => println!("multiply -> {}", err),
        Ok(value) => println!("multiply -> {} (unexpected)", value),
    }

    let results = client
        .call_batch(
            vec![
                BatchItem::call_with_id(RequestId::Number(1), "add", Some(json!({"a": 1, "b": 1}))),
                BatchItem::call_with_id(RequestId::Number(2), "subtract", Some(json!({"a": 1, "b": 1}))),
                BatchItem::notify("shutdown_soon", None),
            ],
            timeout,
        )
        .await
        .expect("batch failed");
    for (id, outcome) in results {
        match outcome {
            Ok(value) => println!("batch #{} -> {}", id, value),
            Err(error) => println!("batch #{} -> error {}", id, error),
        }
    }

    client.close().await.ok();
    caller.join().await.ok();
    server.client().close().await.ok();
    server.join().await.ok();
}
