//! Wire envelopes exchanged between the page and the host.
//!
//! All traffic is UTF-8 JSON text. Three envelope kinds exist:
//!
//! ```text
//! Request:  { "id": "...", "method": "...", "params": [...] }
//! Response: { "id": "...", "result": ..., "error": { "code": int, "message": "..." } }
//! Event:    { "eventName": "...", "eventData": ... }
//! ```
//!
//! A response carries exactly one of `result`/`error`. On the wire an
//! absent `result` is indistinguishable from an explicit `null`, and
//! `wallet_switchEthereumChain` legitimately resolves to `null`, so a
//! response with neither field reads as a `null` result.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A dApp request forwarded from the page to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Opaque, high-entropy, per-request-unique correlation token.
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl RequestEnvelope {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// The host's answer to a single request id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl ResponseEnvelope {
    /// Create a success response.
    pub fn success(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: impl Into<String>, error: RpcErrorObject) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }

    /// Collapse into the settlement outcome for the pending future.
    pub fn into_outcome(self) -> std::result::Result<Value, RpcErrorObject> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Wire error object: `{ code, message }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i32,
    pub message: String,
}

/// An uncorrelated event pushed by the host at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "eventName")]
    pub event_name: String,
    #[serde(rename = "eventData")]
    pub event_data: Value,
}

impl EventEnvelope {
    pub fn new(event_name: impl Into<String>, event_data: Value) -> Self {
        Self {
            event_name: event_name.into(),
            event_data,
        }
    }
}

/// Classification of host-to-page traffic.
///
/// Responses carry an `id`; events carry `eventName`/`eventData`.
/// Untagged deserialization tries responses first, so an event without
/// an `id` falls through to the second arm.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HostMessage {
    Response(ResponseEnvelope),
    Event(EventEnvelope),
}

/// Standard provider event names pushed by the host.
pub mod events {
    pub const ACCOUNTS_CHANGED: &str = "accountsChanged";
    pub const CHAIN_CHANGED: &str = "chainChanged";
    pub const CONNECT: &str = "connect";
    pub const DISCONNECT: &str = "disconnect";
    pub const MESSAGE: &str = "message";
}

/// Best-effort recovery of a request id from a payload that failed full
/// envelope parsing. Returns `None` when no string id is present, in
/// which case the request is dropped (its future stays unsettled).
pub fn recover_id(raw: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw).ok()?;
    value.get("id")?.as_str().map(String::from)
}
