use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// JSON-RPC error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    /// Any application-defined code outside the reserved range.
    ServerError(i32),
}

impl JsonRpcErrorCode {
    pub fn code(&self) -> i32 {
        match self {
            JsonRpcErrorCode::ParseError => -32700,
            JsonRpcErrorCode::InvalidRequest => -32600,
            JsonRpcErrorCode::MethodNotFound => -32601,
            JsonRpcErrorCode::InvalidParams => -32602,
            JsonRpcErrorCode::InternalError => -32603,
            JsonRpcErrorCode::ServerError(code) => *code,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            JsonRpcErrorCode::ParseError => "Parse error",
            JsonRpcErrorCode::InvalidRequest => "Invalid Request",
            JsonRpcErrorCode::MethodNotFound => "Method not found",
            JsonRpcErrorCode::InvalidParams => "Invalid params",
            JsonRpcErrorCode::InternalError => "Internal error",
            JsonRpcErrorCode::ServerError(_) => "Server error",
        }
    }
}

impl fmt::Display for JsonRpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// JSON-RPC Error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    pub fn new(code: JsonRpcErrorCode, message: Option<String>, data: Option<Value>) -> Self {
        Self {
            code: code.code(),
            message: message.unwrap_or_else(|| code.message().to_string()),
            data,
        }
    }

    pub fn parse_error(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::ParseError, None, data)
    }

    pub fn invalid_request() -> Self {
        Self::new(JsonRpcErrorCode::InvalidRequest, None, None)
    }

    /// Method-not-found reply. The unknown method name travels in `data`.
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::MethodNotFound,
            None,
            Some(Value::String(method.to_string())),
        )
    }

    pub fn invalid_params() -> Self {
        Self::new(JsonRpcErrorCode::InvalidParams, None, None)
    }

    pub fn internal_error() -> Self {
        Self::new(JsonRpcErrorCode::InternalError, None, None)
    }

    pub fn server_error(code: i32, message: &str, data: Option<Value>) -> Self {
        Self::new(
            JsonRpcErrorCode::ServerError(code),
            Some(message.to_string()),
            data,
        )
    }
}

impl fmt::Display for JsonRpcErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// The `error` member of a response.
///
/// Some peers send a bare string where the structured object belongs. That is
/// non-conformant but common enough to tolerate on input; everything this
/// crate emits on its own behalf is the structured form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorData {
    Object(JsonRpcErrorObject),
    Text(String),
}

impl ErrorData {
    pub fn code(&self) -> Option<i32> {
        match self {
            ErrorData::Object(obj) => Some(obj.code),
            ErrorData::Text(_) => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ErrorData::Object(obj) => &obj.message,
            ErrorData::Text(text) => text,
        }
    }
}

impl fmt::Display for ErrorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorData::Object(obj) => obj.fmt(f),
            ErrorData::Text(text) => write!(f, "{}", text),
        }
    }
}

impl From<JsonRpcErrorObject> for ErrorData {
    fn from(obj: JsonRpcErrorObject) -> Self {
        ErrorData::Object(obj)
    }
}

/// Why an inbound text frame could not be decoded.
///
/// Each class maps onto exactly one wire reply, see [`DecodeFailure::to_error_object`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeFailure {
    /// Valid JSON that is not any JSON-RPC 2.0 shape.
    #[error("invalid request")]
    InvalidRequest,
    /// Byte-level syntax error.
    #[error("unexpected byte {0:?}")]
    UnexpectedByte(char),
    /// Input ended mid-document.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// Malformed escape or unicode sequence inside a string.
    #[error("unexpected sequence {0:?}")]
    UnexpectedSequence(String),
}

impl DecodeFailure {
    /// The protocol-compliant reply for this failure.
    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            DecodeFailure::InvalidRequest => JsonRpcErrorObject::invalid_request(),
            DecodeFailure::UnexpectedByte(byte) => JsonRpcErrorObject::parse_error(Some(
                Value::String(format!("Unexpected Byte: \"{}\"", byte)),
            )),
            DecodeFailure::UnexpectedEof => JsonRpcErrorObject::parse_error(Some(Value::String(
                "Unexpected End of Input".to_string(),
            ))),
            DecodeFailure::UnexpectedSequence(seq) => JsonRpcErrorObject::parse_error(Some(
                Value::String(format!("Unexpected Sequence: \"{}\"", seq)),
            )),
        }
    }
}

/// Domain error returned by a registered request handler.
///
/// Handlers never see protocol framing; the engine converts these into wire
/// error responses.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid params")]
    InvalidParams,
    #[error("internal error")]
    Internal,
    /// Surfaced to the peer verbatim. Holds the structured object form, so
    /// a handler cannot put a non-conformant error on the wire.
    #[error("{0}")]
    Custom(JsonRpcErrorObject),
}

impl HandlerError {
    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            HandlerError::InvalidParams => JsonRpcErrorObject::invalid_params(),
            HandlerError::Internal => JsonRpcErrorObject::internal_error(),
            HandlerError::Custom(error) => error.clone(),
        }
    }

    /// Application error with an arbitrary code.
    pub fn custom(code: i32, message: &str, data: Option<Value>) -> Self {
        HandlerError::Custom(JsonRpcErrorObject::server_error(code, message, data))
    }
}

/// Failure reported by the host's transport sender.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SendError(String);

impl SendError {
    pub fn new(message: impl Into<String>) -> Self {
        SendError(message.into())
    }
}

/// Abnormal engine termination.
///
/// A failed send means the connection is presumed dead; outstanding waiters
/// are orphaned and observe their own call timeouts.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Socket Closed")]
    SocketClosed(#[source] SendError),
    #[error("engine task stopped unexpectedly")]
    TaskFailed,
}

/// Failure of a `call` or `call_batch` that is not a peer-returned error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    #[error("request timed out")]
    Timeout,
    /// The engine stopped before the response arrived.
    #[error("connection closed")]
    Closed,
}

/// Everything a singleton `call` can fail with.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The peer answered with an error response.
    #[error("server returned error: {0}")]
    Returned(ErrorData),
    /// The response arrived but its result did not decode to the requested type.
    #[error("failed to decode result: {0}")]
    Decode(#[source] serde_json::Error),
    #[error(transparent)]
    Call(#[from] CallError),
}
