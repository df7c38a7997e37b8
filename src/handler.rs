//! Handler seams and the connection builder.
//!
//! Request handlers return domain results only; the engine owns the
//! conversion into protocol framing. Notification handlers return nothing
//! and cannot fail observably.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::engine::{Engine, FrameSink};
use crate::error::HandlerError;

/// Trait for handling JSON-RPC method calls.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, params: Option<Value>) -> Result<Value, HandlerError>;
}

/// Trait for handling JSON-RPC notifications.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn notify(&self, params: Option<Value>);
}

type BoxedRequestFn =
    Box<dyn Fn(Option<Value>) -> BoxFuture<'static, Result<Value, HandlerError>> + Send + Sync>;

type BoxedNotificationFn = Box<dyn Fn(Option<Value>) -> BoxFuture<'static, ()> + Send + Sync>;

struct FnRequestHandler(BoxedRequestFn);

#[async_trait]
impl RequestHandler for FnRequestHandler {
    async fn handle(&self, params: Option<Value>) -> Result<Value, HandlerError> {
        (self.0)(params).await
    }
}

struct FnNotificationHandler(BoxedNotificationFn);

#[async_trait]
impl NotificationHandler for FnNotificationHandler {
    async fn notify(&self, params: Option<Value>) {
        (self.0)(params).await
    }
}

/// Builder collecting the handler tables for one connection.
///
/// Binding consumes the builder, so the tables are immutable for the life
/// of the engine.
#[derive(Default)]
pub struct RpcBuilder {
    pub(crate) methods: HashMap<String, Arc<dyn RequestHandler>>,
    pub(crate) notifications: HashMap<String, Arc<dyn NotificationHandler>>,
}

impl RpcBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a request method.
    pub fn method<H>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: RequestHandler + 'static,
    {
        self.methods.insert(name.into(), Arc::new(handler));
        self
    }

    /// Register an async closure for a request method.
    pub fn method_fn<F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        self.method(
            name,
            FnRequestHandler(Box::new(
                move |params| -> BoxFuture<'static, Result<Value, HandlerError>> {
                    Box::pin(handler(params))
                },
            )),
        )
    }

    /// Register a handler for a notification method.
    pub fn notification<H>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: NotificationHandler + 'static,
    {
        self.notifications.insert(name.into(), Arc::new(handler));
        self
    }

    /// Register an async closure for a notification method.
    pub fn notification_fn<F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.notification(
            name,
            FnNotificationHandler(Box::new(move |params| -> BoxFuture<'static, ()> {
                Box::pin(handler(params))
            })),
        )
    }

    pub fn registered_methods(&self) -> Vec<String> {
        self.methods.keys().cloned().collect()
    }

    /// Bind the tables to a transport sender, producing the engine state.
    pub fn bind<S: FrameSink>(self, sink: S) -> Engine<S> {
        Engine::new(sink, self.methods, self.notifications)
    }
}
