//! # JSON-RPC 2.0 Duplex Engine
//!
//! A pure, transport-agnostic JSON-RPC 2.0 implementation that lets one
//! process act as client and server at the same time over a single
//! bidirectional text channel (WebSocket, line-framed TCP, stdio, or
//! anything else the host can read and write).
//!
//! ## Features
//! - **JSON-RPC 2.0 Compliance**: requests, notifications, responses and
//!   batches, with the reserved error codes emitted bit-exactly
//! - **Graceful Degradation**: malformed input is answered with the
//!   matching parse or invalid-request reply, never a crash
//! - **Full Duplex**: outbound calls are correlated to inbound responses
//!   while inbound requests are dispatched to registered handlers, over
//!   one channel
//! - **Transport Agnostic**: the host supplies the send half and feeds
//!   inbound frames; the engine never touches a socket
//! - **Async/Await Support**: handlers are async, callers await one-shot
//!   replies under their own timeouts
//!
//! ## Architecture
//!
//! ```rust,ignore
//! // Register handlers, bind to a transport sender, spawn the engine.
//! let connection = RpcBuilder::new()
//!     .method_fn("ping", |_params| async { Ok(json!("pong")) })
//!     .spawn(sink);
//!
//! // The transport driver feeds inbound frames.
//! connection.frames().text(frame).await?;
//!
//! // Application code issues calls with a deadline.
//! let client = connection.client();
//! let result = client.call("ping", None, Duration::from_secs(5)).await?;
//! ```
//!
//! The engine owns all connection state and consumes one merged mailbox of
//! application commands and inbound frames, so there is no shared mutable
//! state and no lock. Hosts that want full control can `bind` instead of
//! `spawn` and drive [`Engine::handle_text`], [`Engine::handle_binary`] and
//! [`Engine::handle_command`] themselves.

pub mod client;
pub mod codec;
pub mod engine;
pub mod error;
pub mod handler;
pub mod request;
pub mod response;
pub mod types;

// Re-export main types
pub use client::{BatchItem, BatchResults, FrameFeed, RpcClient, RpcConnection};
pub use codec::{decode, encode, Message};
pub use engine::{run, CallReply, Command, Engine, EngineEvent, FrameSink, IdSet, Next};
pub use error::{
    CallError, DecodeFailure, EngineError, ErrorData, HandlerError, JsonRpcErrorCode,
    JsonRpcErrorObject, RequestError, SendError,
};
pub use handler::{NotificationHandler, RequestHandler, RpcBuilder};
pub use request::{JsonRpcNotification, JsonRpcRequest, RequestItem};
pub use response::{JsonRpcError, JsonRpcResponse, ResponseItem};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}
