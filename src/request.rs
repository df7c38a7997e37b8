use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{JsonRpcVersion, RequestId};

/// A JSON-RPC request
///
/// `params` is an opaque JSON value. It is whatever the peer sent on the
/// inbound side and an already-encoded fragment on the outbound side; the
/// codec round-trips it unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            method: method.into(),
            params,
        }
    }

    /// Create a new request with no parameters
    pub fn new_no_params(id: RequestId, method: impl Into<String>) -> Self {
        Self::new(id, method, None)
    }
}

/// A JSON-RPC notification (request without an id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method: method.into(),
            params,
        }
    }
}

/// One element of the request-side traffic: a request expecting a response,
/// or a fire-and-forget notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RequestItem {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

impl RequestItem {
    pub fn method(&self) -> &str {
        match self {
            RequestItem::Request(req) => &req.method,
            RequestItem::Notification(notif) => &notif.method,
        }
    }

    /// The request id, if this element expects a response.
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            RequestItem::Request(req) => Some(&req.id),
            RequestItem::Notification(_) => None,
        }
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, RequestItem::Notification(_))
    }
}

impl From<JsonRpcRequest> for RequestItem {
    fn from(req: JsonRpcRequest) -> Self {
        RequestItem::Request(req)
    }
}

impl From<JsonRpcNotification> for RequestItem {
    fn from(notif: JsonRpcNotification) -> Self {
        RequestItem::Notification(notif)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_str, json, to_string};

    #[test]
    fn test_request_serialization() {
        let request = JsonRpcRequest::new_no_params(RequestId::Number(1), "test_method");

        let json = to_string(&request).unwrap();
        let parsed: JsonRpcRequest = from_str(&json).unwrap();

        assert_eq!(parsed.id, RequestId::Number(1));
        assert_eq!(parsed.method, "test_method");
        assert!(parsed.params.is_none());
    }

    #[test]
    fn test_params_survive_arbitrary_json() {
        for params in [json!([1, 2]), json!({"a": 1}), json!("scalar"), json!(7)] {
            let request =
                JsonRpcRequest::new(RequestId::String("r".into()), "m", Some(params.clone()));
            let parsed: JsonRpcRequest = from_str(&to_string(&request).unwrap()).unwrap();
            assert_eq!(parsed.params, Some(params));
        }
    }

    #[test]
    fn test_notification_json_format() {
        let notification = JsonRpcNotification::new("ping", None);
        let json_str = to_string(&notification).unwrap();

        // Should not contain an "id" field
        assert!(!json_str.contains("\"id\""));
        assert!(json_str.contains("\"jsonrpc\":\"2.0\""));
        assert!(json_str.contains("\"method\":\"ping\""));
    }

    #[test]
    fn test_request_item_accessors() {
        let req: RequestItem = JsonRpcRequest::new_no_params(RequestId::Number(5), "a").into();
        let notif: RequestItem = JsonRpcNotification::new("b", None).into();

        assert_eq!(req.method(), "a");
        assert_eq!(req.id(), Some(&RequestId::Number(5)));
        assert!(!req.is_notification());

        assert_eq!(notif.method(), "b");
        assert_eq!(notif.id(), None);
        assert!(notif.is_notification());
    }
}
