//! Caller-facing surface: issuing calls, notifications and batches against
//! a running engine, plus the glue that runs an engine on its own task.
//!
//! Callers rendezvous with the engine through one-shot reply channels and
//! bound their own waits with `tokio::time::timeout`. After a receive
//! returns, win or lose, the caller reaps its waiting entry with a remove
//! command so late responses find nothing to resolve.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time;

use crate::engine::{self, Command, EngineEvent, FrameSink, IdSet};
use crate::error::{CallError, EngineError, ErrorData, RequestError};
use crate::handler::RpcBuilder;
use crate::request::{JsonRpcNotification, JsonRpcRequest, RequestItem};
use crate::types::RequestId;

/// Outcomes of a batch call, keyed by request id.
///
/// Iteration order mirrors the response array as it appeared on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResults {
    entries: Vec<(RequestId, Result<Value, ErrorData>)>,
}

impl BatchResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: RequestId, outcome: Result<Value, ErrorData>) {
        self.entries.push((id, outcome));
    }

    pub fn get(&self, id: &RequestId) -> Option<&Result<Value, ErrorData>> {
        self.entries
            .iter()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, outcome)| outcome)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(RequestId, Result<Value, ErrorData>)> {
        self.entries.iter()
    }
}

impl IntoIterator for BatchResults {
    type Item = (RequestId, Result<Value, ErrorData>);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// One element of an outbound batch.
#[derive(Debug, Clone)]
pub enum BatchItem {
    /// A request. With no id, a UUID-v4 string id is assigned at send time.
    Call {
        id: Option<RequestId>,
        method: String,
        params: Option<Value>,
    },
    /// A notification. Contributes nothing to the response.
    Notify {
        method: String,
        params: Option<Value>,
    },
}

impl BatchItem {
    pub fn call(method: impl Into<String>, params: Option<Value>) -> Self {
        BatchItem::Call {
            id: None,
            method: method.into(),
            params,
        }
    }

    pub fn call_with_id(
        id: RequestId,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> Self {
        BatchItem::Call {
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    pub fn notify(method: impl Into<String>, params: Option<Value>) -> Self {
        BatchItem::Notify {
            method: method.into(),
            params,
        }
    }
}

/// Handle for issuing outbound traffic on a spawned connection.
///
/// Cheap to clone; all clones feed the same engine mailbox.
#[derive(Clone)]
pub struct RpcClient {
    events: mpsc::Sender<EngineEvent>,
}

impl RpcClient {
    async fn command(&self, command: Command) -> Result<(), CallError> {
        self.events
            .send(EngineEvent::Command(command))
            .await
            .map_err(|_| CallError::Closed)
    }

    /// Send a request with a generated id and await the matching response.
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, RequestError> {
        self.call_with_id(RequestId::generate(), method, params, timeout)
            .await
    }

    /// Send a request under a caller-chosen id.
    ///
    /// Ids must be unique among in-flight calls: a reused id displaces the
    /// earlier call's waiter and is diagnosed, not reconciled.
    pub async fn call_with_id(
        &self,
        id: RequestId,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, RequestError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = JsonRpcRequest::new(id.clone(), method, params);
        self.command(Command::Request {
            request,
            reply: reply_tx,
        })
        .await?;

        let outcome = time::timeout(timeout, reply_rx).await;
        // Win or lose, reap the waiting entry.
        let _ = self.command(Command::RemoveWaiting(id)).await;

        match outcome {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(error))) => Err(RequestError::Returned(error)),
            Ok(Err(_)) => Err(CallError::Closed.into()),
            Err(_) => Err(CallError::Timeout.into()),
        }
    }

    /// `call`, decoding the result into `T`.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<T, RequestError> {
        let result = self.call(method, params, timeout).await?;
        serde_json::from_value(result).map_err(RequestError::Decode)
    }

    /// Send a notification. Fire and forget: no id, no waiter.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), CallError> {
        self.command(Command::Notification(JsonRpcNotification::new(
            method, params,
        )))
        .await
    }

    /// Send a batch and await the response array as a map keyed by id.
    ///
    /// Notifications in the batch contribute nothing to the result; a batch
    /// of only notifications resolves immediately with an empty map.
    pub async fn call_batch(
        &self,
        items: Vec<BatchItem>,
        timeout: Duration,
    ) -> Result<BatchResults, CallError> {
        let mut ids = IdSet::new();
        let mut wire_items = Vec::with_capacity(items.len());
        for item in items {
            match item {
                BatchItem::Call { id, method, params } => {
                    let id = id.unwrap_or_else(RequestId::generate);
                    ids.insert(id.clone());
                    wire_items.push(RequestItem::Request(JsonRpcRequest::new(
                        id, method, params,
                    )));
                }
                BatchItem::Notify { method, params } => {
                    wire_items.push(RequestItem::Notification(JsonRpcNotification::new(
                        method, params,
                    )));
                }
            }
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.command(Command::Batch {
            items: wire_items,
            ids: ids.clone(),
            reply: reply_tx,
        })
        .await?;

        let outcome = time::timeout(timeout, reply_rx).await;
        let _ = self.command(Command::RemoveWaitingBatch(ids)).await;

        match outcome {
            Ok(Ok(results)) => Ok(results),
            Ok(Err(_)) => Err(CallError::Closed),
            Err(_) => Err(CallError::Timeout),
        }
    }

    /// Stop the engine normally.
    pub async fn close(&self) -> Result<(), CallError> {
        self.command(Command::Close).await
    }
}

/// Handle for feeding inbound transport frames to a spawned connection.
#[derive(Clone)]
pub struct FrameFeed {
    events: mpsc::Sender<EngineEvent>,
}

impl FrameFeed {
    pub async fn text(&self, text: impl Into<String>) -> Result<(), CallError> {
        self.events
            .send(EngineEvent::Text(text.into()))
            .await
            .map_err(|_| CallError::Closed)
    }

    pub async fn binary(&self, bytes: Vec<u8>) -> Result<(), CallError> {
        self.events
            .send(EngineEvent::Binary(bytes))
            .await
            .map_err(|_| CallError::Closed)
    }
}

/// A connection whose engine runs on its own task, consuming one merged
/// mailbox of commands and inbound frames.
pub struct RpcConnection {
    client: RpcClient,
    frames: FrameFeed,
    task: JoinHandle<Result<(), EngineError>>,
}

impl RpcConnection {
    pub fn client(&self) -> RpcClient {
        self.client.clone()
    }

    pub fn frames(&self) -> FrameFeed {
        self.frames.clone()
    }

    /// Wait for the engine to stop and report how it went.
    pub async fn join(self) -> Result<(), EngineError> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(_) => Err(EngineError::TaskFailed),
        }
    }
}

impl RpcBuilder {
    /// Bind to a sink and run the engine on its own task.
    pub fn spawn<S>(self, sink: S) -> RpcConnection
    where
        S: FrameSink + 'static,
    {
        let engine = self.bind(sink);
        let (events_tx, events_rx) = mpsc::channel(64);
        let task = tokio::spawn(engine::run(engine, events_rx));
        RpcConnection {
            client: RpcClient {
                events: events_tx.clone(),
            },
            frames: FrameFeed { events: events_tx },
            task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_results_order_and_lookup() {
        let mut results = BatchResults::new();
        results.insert(RequestId::Number(2), Ok(json!("B")));
        results.insert(RequestId::Number(1), Ok(json!("A")));

        let order: Vec<&RequestId> = results.iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![&RequestId::Number(2), &RequestId::Number(1)]);
        assert_eq!(results.get(&RequestId::Number(1)), Some(&Ok(json!("A"))));
        assert_eq!(results.get(&RequestId::Number(3)), None);
        assert_eq!(results.len(), 2);
        assert!(!results.is_empty());
    }

    #[test]
    fn test_batch_item_constructors() {
        match BatchItem::call("m", Some(json!([1]))) {
            BatchItem::Call { id, method, params } => {
                assert!(id.is_none());
                assert_eq!(method, "m");
                assert_eq!(params, Some(json!([1])));
            }
            BatchItem::Notify { .. } => panic!("expected call"),
        }
        match BatchItem::notify("n", None) {
            BatchItem::Notify { method, params } => {
                assert_eq!(method, "n");
                assert!(params.is_none());
            }
            BatchItem::Call { .. } => panic!("expected notification"),
        }
    }
}
