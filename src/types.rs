//! Request identifiers and the protocol version marker.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The id correlating a request with its response.
///
/// The wire allows integers and strings, never null. Beyond the wire
/// representation, ids key the pending-call map and populate the sorted
/// id-sets that key pending batches, so the type carries `Hash` and a
/// total `Ord` (numeric ids sort before string ids).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl RequestId {
    /// Mint a fresh UUID-v4 string id for an outbound request the caller
    /// left unnumbered.
    pub fn generate() -> Self {
        RequestId::String(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => n.fmt(f),
            RequestId::String(s) => s.fmt(f),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// Protocol revision marker.
///
/// Every frame this crate emits carries `"2.0"`; any other value on input
/// fails to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JsonRpcVersion {
    #[default]
    #[serde(rename = "2.0")]
    V2_0,
}

impl fmt::Display for JsonRpcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("2.0")
    }
}
