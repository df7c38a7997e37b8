use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorData, JsonRpcErrorObject};
use crate::types::{JsonRpcVersion, RequestId};

/// A successful JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub result: Value,
}

impl JsonRpcResponse {
    pub fn new(id: RequestId, result: Value) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            result,
        }
    }
}

/// A JSON-RPC error response.
///
/// The id is absent when the sender could not identify the request it is
/// answering; it is encoded as JSON `null` in that case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    #[serde(default)]
    pub id: Option<RequestId>,
    pub error: ErrorData,
}

impl JsonRpcError {
    pub fn new(id: Option<RequestId>, error: ErrorData) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            error,
        }
    }

    /// An id-less error frame, used for parse diagnostics.
    pub fn bare(error: JsonRpcErrorObject) -> Self {
        Self::new(None, ErrorData::Object(error))
    }

    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::new(
            Some(id),
            ErrorData::Object(JsonRpcErrorObject::method_not_found(method)),
        )
    }

    pub fn invalid_params(id: RequestId) -> Self {
        Self::new(
            Some(id),
            ErrorData::Object(JsonRpcErrorObject::invalid_params()),
        )
    }

    pub fn internal_error(id: RequestId) -> Self {
        Self::new(
            Some(id),
            ErrorData::Object(JsonRpcErrorObject::internal_error()),
        )
    }
}

/// One element of the response-side traffic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseItem {
    Success(JsonRpcResponse),
    Error(JsonRpcError),
}

impl ResponseItem {
    /// Get the request ID from either response or error
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            ResponseItem::Success(resp) => Some(&resp.id),
            ResponseItem::Error(err) => err.id.as_ref(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ResponseItem::Error(_))
    }

    /// The caller-facing outcome this response carries.
    pub fn into_outcome(self) -> (Option<RequestId>, Result<Value, ErrorData>) {
        match self {
            ResponseItem::Success(resp) => (Some(resp.id), Ok(resp.result)),
            ResponseItem::Error(err) => (err.id, Err(err.error)),
        }
    }
}

impl From<JsonRpcResponse> for ResponseItem {
    fn from(response: JsonRpcResponse) -> Self {
        ResponseItem::Success(response)
    }
}

impl From<JsonRpcError> for ResponseItem {
    fn from(error: JsonRpcError) -> Self {
        ResponseItem::Error(error)
    }
}
