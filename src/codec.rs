//! Wire codec: text frames to typed messages and back.
//!
//! The decoder accepts five top-level shapes: a single request or
//! notification, a single response, a bare error object, an array of
//! request-side elements, and an array of response-side elements.
//! Discrimination is by key presence, tried in that order for single
//! objects; array elements are classified request-side first. Anything
//! else is a structural failure answered with `-32600`, and JSON-level
//! failures are classified into the three parse-error flavors.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{DecodeFailure, ErrorData};
use crate::request::{JsonRpcNotification, JsonRpcRequest, RequestItem};
use crate::response::{JsonRpcError, JsonRpcResponse, ResponseItem};
use crate::types::RequestId;

/// Everything that can travel over the channel, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Message {
    /// A single request or notification.
    Request(RequestItem),
    /// A single response, success or error, carrying a request id.
    Response(ResponseItem),
    /// An error object with no id: the sender could not tell which request
    /// it is answering. Encoded with `"id": null`.
    Error(JsonRpcError),
    /// A non-empty array of requests and/or notifications.
    RequestBatch(Vec<RequestItem>),
    /// A non-empty array of responses.
    ResponseBatch(Vec<ResponseItem>),
}

impl From<RequestItem> for Message {
    fn from(item: RequestItem) -> Self {
        Message::Request(item)
    }
}

impl From<ResponseItem> for Message {
    fn from(item: ResponseItem) -> Self {
        Message::Response(item)
    }
}

/// Serialize a message with canonical JSON-RPC 2.0 framing.
pub fn encode(message: &Message) -> String {
    serde_json::to_string(message).unwrap_or_default()
}

/// Parse one text frame into a typed message.
pub fn decode(text: &str) -> Result<Message, DecodeFailure> {
    let value: Value =
        serde_json::from_str(text).map_err(|err| classify_parse_error(text, &err))?;
    match value {
        Value::Object(obj) => Ok(match decode_object(obj)? {
            ObjectKind::Request(item) => Message::Request(item),
            ObjectKind::Response(item) => Message::Response(item),
            ObjectKind::BareError(err) => Message::Error(err),
        }),
        Value::Array(items) => decode_batch(items),
        _ => Err(DecodeFailure::InvalidRequest),
    }
}

enum ObjectKind {
    Request(RequestItem),
    Response(ResponseItem),
    BareError(JsonRpcError),
}

enum IdField {
    Absent,
    Null,
    Valid(RequestId),
    Invalid,
}

fn id_field(obj: &Map<String, Value>) -> IdField {
    match obj.get("id") {
        None => IdField::Absent,
        Some(Value::Null) => IdField::Null,
        Some(Value::Number(n)) => match n.as_i64() {
            Some(n) => IdField::Valid(RequestId::Number(n)),
            // Floats and out-of-range integers are not ids.
            None => IdField::Invalid,
        },
        Some(Value::String(s)) => IdField::Valid(RequestId::String(s.clone())),
        Some(_) => IdField::Invalid,
    }
}

fn decode_error_data(value: Option<&Value>) -> Result<ErrorData, DecodeFailure> {
    let value = value.cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|_| DecodeFailure::InvalidRequest)
}

fn decode_object(obj: Map<String, Value>) -> Result<ObjectKind, DecodeFailure> {
    let id = id_field(&obj);
    let has_result = obj.contains_key("result");
    let has_error = obj.contains_key("error");

    // A response: an id plus a result or error member.
    if let IdField::Valid(id) = &id {
        if has_result {
            let result = obj.get("result").cloned().unwrap_or(Value::Null);
            return Ok(ObjectKind::Response(ResponseItem::Success(
                JsonRpcResponse::new(id.clone(), result),
            )));
        }
        if has_error {
            let error = decode_error_data(obj.get("error"))?;
            return Ok(ObjectKind::Response(ResponseItem::Error(JsonRpcError::new(
                Some(id.clone()),
                error,
            ))));
        }
    }

    // A request or notification: a method member decides which by id presence.
    if obj.contains_key("method") {
        return decode_request_item(&obj).map(ObjectKind::Request);
    }

    // A bare error: an error member with no usable id.
    if has_error && !has_result {
        if let IdField::Absent | IdField::Null = id {
            let error = decode_error_data(obj.get("error"))?;
            return Ok(ObjectKind::BareError(JsonRpcError::new(None, error)));
        }
    }

    Err(DecodeFailure::InvalidRequest)
}

fn decode_request_item(obj: &Map<String, Value>) -> Result<RequestItem, DecodeFailure> {
    let method = obj
        .get("method")
        .and_then(Value::as_str)
        .ok_or(DecodeFailure::InvalidRequest)?
        .to_string();
    let params = obj.get("params").cloned();
    match id_field(obj) {
        IdField::Valid(id) => Ok(RequestItem::Request(JsonRpcRequest::new(id, method, params))),
        IdField::Absent => Ok(RequestItem::Notification(JsonRpcNotification::new(
            method, params,
        ))),
        // A request id must be an integer or a string.
        IdField::Null | IdField::Invalid => Err(DecodeFailure::InvalidRequest),
    }
}

fn decode_response_element(obj: &Map<String, Value>) -> Result<ResponseItem, DecodeFailure> {
    let has_result = obj.contains_key("result");
    let has_error = obj.contains_key("error");
    match id_field(obj) {
        IdField::Valid(id) if has_result => {
            let result = obj.get("result").cloned().unwrap_or(Value::Null);
            Ok(ResponseItem::Success(JsonRpcResponse::new(id, result)))
        }
        IdField::Valid(id) if has_error => {
            let error = decode_error_data(obj.get("error"))?;
            Ok(ResponseItem::Error(JsonRpcError::new(Some(id), error)))
        }
        IdField::Absent | IdField::Null if has_error && !has_result => {
            let error = decode_error_data(obj.get("error"))?;
            Ok(ResponseItem::Error(JsonRpcError::new(None, error)))
        }
        _ => Err(DecodeFailure::InvalidRequest),
    }
}

fn decode_batch(items: Vec<Value>) -> Result<Message, DecodeFailure> {
    if items.is_empty() {
        return Err(DecodeFailure::InvalidRequest);
    }
    let mut requests = Vec::new();
    let mut responses = Vec::new();
    for item in items {
        let Value::Object(obj) = item else {
            return Err(DecodeFailure::InvalidRequest);
        };
        if obj.contains_key("method") {
            requests.push(decode_request_item(&obj)?);
        } else {
            responses.push(decode_response_element(&obj)?);
        }
        // Mixing request-side and response-side elements is a protocol violation.
        if !requests.is_empty() && !responses.is_empty() {
            return Err(DecodeFailure::InvalidRequest);
        }
    }
    if requests.is_empty() {
        Ok(Message::ResponseBatch(responses))
    } else {
        Ok(Message::RequestBatch(requests))
    }
}

fn classify_parse_error(text: &str, err: &serde_json::Error) -> DecodeFailure {
    if err.classify() == serde_json::error::Category::Eof {
        return DecodeFailure::UnexpectedEof;
    }
    let offset = byte_offset(text, err.line(), err.column());
    let detail = err.to_string();
    if detail.contains("escape") || detail.contains("surrogate") || detail.contains("unicode") {
        return DecodeFailure::UnexpectedSequence(escape_fragment(text, offset));
    }
    match char_at(text, offset) {
        Some(byte) => DecodeFailure::UnexpectedByte(byte),
        None => DecodeFailure::UnexpectedEof,
    }
}

/// Byte offset of the 1-based (line, column) a `serde_json::Error` reports.
fn byte_offset(text: &str, line: usize, column: usize) -> usize {
    if line <= 1 {
        return column.saturating_sub(1);
    }
    let mut newlines = line - 1;
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' {
            newlines -= 1;
            if newlines == 0 {
                return i + 1 + column.saturating_sub(1);
            }
        }
    }
    column.saturating_sub(1)
}

fn char_at(text: &str, offset: usize) -> Option<char> {
    if text.is_empty() {
        return None;
    }
    let mut i = offset.min(text.len() - 1);
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    text[i..].chars().next()
}

/// The escape sequence around the reported offset, starting at the
/// introducing backslash when one is in reach.
fn escape_fragment(text: &str, offset: usize) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut i = offset.min(text.len() - 1);
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    let end = i + text[i..].chars().next().map(char::len_utf8).unwrap_or(0);
    let window_start = i.saturating_sub(8);
    let start = text[window_start..end]
        .rfind('\\')
        .map(|p| window_start + p)
        .unwrap_or(i);
    text[start..end].to_string()
}
