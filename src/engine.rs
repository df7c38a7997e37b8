//! Per-connection state machine.
//!
//! One engine owns one channel: the handler tables for the server role and
//! the pending-call maps for the client role. All mutation happens on the
//! task driving it; inbound frames and application commands are consumed
//! one at a time, so handler invocations and correlation updates never
//! race.
//!
//! A pending call moves through four states: created, in flight (entry in
//! the waiting map), resolved (one-shot delivered), reaped (entry removed).
//! Routing a response resolves the waiter but leaves the entry behind; the
//! caller deletes it with an explicit remove command once its own receive
//! has returned, win or lose. A response that arrives after the entry is
//! gone is logged and dropped rather than routed, which keeps a retried id
//! from ever stealing a stale reply.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::client::BatchResults;
use crate::codec::{self, Message};
use crate::error::{EngineError, ErrorData, JsonRpcErrorObject, SendError};
use crate::handler::{NotificationHandler, RequestHandler};
use crate::request::{JsonRpcNotification, JsonRpcRequest, RequestItem};
use crate::response::{JsonRpcError, JsonRpcResponse, ResponseItem};
use crate::types::RequestId;

/// The send half of the transport, supplied by the host.
///
/// The engine serializes its calls; a sink never sees two sends at once
/// from the same connection. Returning an error declares the connection
/// dead and stops the engine.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), SendError>;
}

#[async_trait]
impl<F> FrameSink for F
where
    F: FnMut(String) -> Result<(), SendError> + Send,
{
    async fn send_text(&mut self, text: String) -> Result<(), SendError> {
        (self)(text)
    }
}

/// The correlation key of a pending batch: the set of request ids it
/// contained, notifications excluded.
pub type IdSet = BTreeSet<RequestId>;

/// Outcome delivered to a singleton caller.
pub type CallReply = Result<Value, ErrorData>;

/// Application-initiated work for the engine.
pub enum Command {
    /// Send a request and register a waiter under its id.
    Request {
        request: JsonRpcRequest,
        reply: oneshot::Sender<CallReply>,
    },
    /// Send a notification. No waiter, no reply.
    Notification(JsonRpcNotification),
    /// Send a batch and register a waiter under its id-set.
    Batch {
        items: Vec<RequestItem>,
        ids: IdSet,
        reply: oneshot::Sender<BatchResults>,
    },
    /// Reap a call entry after the caller's receive returned.
    RemoveWaiting(RequestId),
    /// Reap a batch entry after the caller's receive returned.
    RemoveWaitingBatch(IdSet),
    /// Stop the engine normally.
    Close,
}

/// What the engine should do after processing one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Continue,
    Closed,
}

// A waiter that has been resolved keeps its map entry (with the sender
// consumed) until the caller reaps it.
type ReplySlot<T> = Option<oneshot::Sender<T>>;

/// Per-connection engine state. See the module docs for the lifecycle.
pub struct Engine<S> {
    sink: S,
    methods: HashMap<String, Arc<dyn RequestHandler>>,
    notifications: HashMap<String, Arc<dyn NotificationHandler>>,
    waiting: HashMap<RequestId, ReplySlot<CallReply>>,
    waiting_batches: HashMap<IdSet, ReplySlot<BatchResults>>,
}

impl<S: FrameSink> Engine<S> {
    pub(crate) fn new(
        sink: S,
        methods: HashMap<String, Arc<dyn RequestHandler>>,
        notifications: HashMap<String, Arc<dyn NotificationHandler>>,
    ) -> Self {
        Self {
            sink,
            methods,
            notifications,
            waiting: HashMap::new(),
            waiting_batches: HashMap::new(),
        }
    }

    /// Process one inbound text frame.
    pub async fn handle_text(&mut self, text: &str) -> Result<Next, EngineError> {
        match codec::decode(text) {
            Ok(message) => self.dispatch_inbound(message).await,
            Err(failure) => {
                debug!(%failure, "inbound frame did not decode");
                let reply = JsonRpcError::bare(failure.to_error_object());
                self.send_message(&Message::Error(reply)).await?;
                Ok(Next::Continue)
            }
        }
    }

    /// Reject one inbound binary frame. Binary payloads are not JSON-RPC 2.0.
    pub async fn handle_binary(&mut self, _bytes: &[u8]) -> Result<Next, EngineError> {
        let reply = JsonRpcError::bare(JsonRpcErrorObject::parse_error(Some(Value::String(
            "binary frames are unsupported".to_string(),
        ))));
        self.send_message(&Message::Error(reply)).await?;
        Ok(Next::Continue)
    }

    /// Process one application command.
    pub async fn handle_command(&mut self, command: Command) -> Result<Next, EngineError> {
        match command {
            Command::Request { request, reply } => {
                let id = request.id.clone();
                self.send_message(&Message::Request(RequestItem::Request(request)))
                    .await?;
                if self.waiting.insert(id.clone(), Some(reply)).is_some() {
                    warn!(%id, "replaced a pending call that reused the same id");
                }
            }
            Command::Notification(notification) => {
                self.send_message(&Message::Request(RequestItem::Notification(notification)))
                    .await?;
            }
            Command::Batch { items, ids, reply } => {
                self.send_message(&Message::RequestBatch(items)).await?;
                if ids.is_empty() {
                    // Nothing to correlate: the batch was all notifications.
                    let _ = reply.send(BatchResults::new());
                } else if self.waiting_batches.insert(ids, Some(reply)).is_some() {
                    warn!("replaced a pending batch that reused the same id set");
                }
            }
            Command::RemoveWaiting(id) => {
                self.waiting.remove(&id);
            }
            Command::RemoveWaitingBatch(ids) => {
                self.waiting_batches.remove(&ids);
            }
            Command::Close => return Ok(Next::Closed),
        }
        Ok(Next::Continue)
    }

    async fn dispatch_inbound(&mut self, message: Message) -> Result<Next, EngineError> {
        match message {
            Message::Request(item) => {
                if let Some(response) = self.process_request_item(item).await {
                    self.send_message(&Message::Response(response)).await?;
                }
            }
            Message::Response(item) => self.route_response(item),
            Message::Error(err) => {
                warn!(
                    code = ?err.error.code(),
                    message = err.error.message(),
                    "peer sent an error with no request id"
                );
            }
            Message::RequestBatch(items) => {
                let mut responses = Vec::new();
                for item in items {
                    if let Some(response) = self.process_request_item(item).await {
                        responses.push(response);
                    }
                }
                // An all-notification batch gets no reply at all.
                if !responses.is_empty() {
                    self.send_message(&Message::ResponseBatch(responses)).await?;
                }
            }
            Message::ResponseBatch(items) => self.route_batch_response(items),
        }
        Ok(Next::Continue)
    }

    async fn process_request_item(&mut self, item: RequestItem) -> Option<ResponseItem> {
        match item {
            RequestItem::Request(request) => Some(self.process_request(request).await),
            RequestItem::Notification(notification) => {
                self.process_notification(notification).await;
                None
            }
        }
    }

    async fn process_request(&mut self, request: JsonRpcRequest) -> ResponseItem {
        let Some(handler) = self.methods.get(&request.method).cloned() else {
            return ResponseItem::Error(JsonRpcError::method_not_found(
                request.id,
                &request.method,
            ));
        };
        match handler.handle(request.params).await {
            Ok(result) => ResponseItem::Success(JsonRpcResponse::new(request.id, result)),
            Err(domain_error) => ResponseItem::Error(JsonRpcError::new(
                Some(request.id),
                domain_error.to_error_object().into(),
            )),
        }
    }

    async fn process_notification(&mut self, notification: JsonRpcNotification) {
        match self.notifications.get(&notification.method).cloned() {
            Some(handler) => handler.notify(notification.params).await,
            None => warn!(
                method = %notification.method,
                "no handler registered for notification"
            ),
        }
    }

    fn route_response(&mut self, item: ResponseItem) {
        let (id, outcome) = item.into_outcome();
        let Some(id) = id else {
            warn!("error response carried no request id");
            return;
        };
        match self.waiting.get_mut(&id) {
            Some(slot) => match slot.take() {
                Some(reply) => {
                    if reply.send(outcome).is_err() {
                        debug!(%id, "caller stopped waiting before the response arrived");
                    }
                }
                None => warn!(%id, "duplicate response for an already resolved call"),
            },
            None => warn!(%id, "response does not match any pending call"),
        }
    }

    fn route_batch_response(&mut self, items: Vec<ResponseItem>) {
        let mut ids = IdSet::new();
        let mut results = BatchResults::new();
        for item in items {
            let (id, outcome) = item.into_outcome();
            match id {
                Some(id) => {
                    ids.insert(id.clone());
                    results.insert(id, outcome);
                }
                None => warn!("batch response element carried no request id"),
            }
        }
        match self.waiting_batches.get_mut(&ids) {
            Some(slot) => match slot.take() {
                Some(reply) => {
                    if reply.send(results).is_err() {
                        debug!("caller stopped waiting before the batch response arrived");
                    }
                }
                None => warn!(?ids, "duplicate response for an already resolved batch"),
            },
            None => warn!(?ids, "batch response does not match any pending batch"),
        }
    }

    async fn send_message(&mut self, message: &Message) -> Result<(), EngineError> {
        self.sink
            .send_text(codec::encode(message))
            .await
            .map_err(EngineError::SocketClosed)
    }
}

/// One event on the engine's merged mailbox.
pub enum EngineEvent {
    Text(String),
    Binary(Vec<u8>),
    Command(Command),
}

/// Drive an engine from a single mailbox until it stops.
///
/// Returns `Ok(())` on a normal stop (close command, or every handle
/// dropped) and the abnormal reason otherwise.
pub async fn run<S: FrameSink>(
    mut engine: Engine<S>,
    mut events: mpsc::Receiver<EngineEvent>,
) -> Result<(), EngineError> {
    while let Some(event) = events.recv().await {
        let next = match event {
            EngineEvent::Text(text) => engine.handle_text(&text).await?,
            EngineEvent::Binary(bytes) => engine.handle_binary(&bytes).await?,
            EngineEvent::Command(command) => engine.handle_command(command).await?,
        };
        if next == Next::Closed {
            break;
        }
    }
    Ok(())
}
