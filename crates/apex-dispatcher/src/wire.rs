use apex_types::RequestId;
use serde::{Deserialize, Serialize};

pub const JSONRPC_VERSION: &str = "2.0";

/// An inbound frame: either a request (has `id`) or a notification (does
/// not). Both share the same wire shape; `id` distinguishes them.
#[derive(Debug, Clone, Deserialize)]
pub struct WireRequest {
    pub jsonrpc: Option<String>,
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl WireRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// One JSON-RPC error object.
#[derive(Debug, Clone, Serialize)]
pub struct WireError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// An outbound response frame. Constructed either via `success` or `failure`
/// — the two are mutually exclusive per the JSON-RPC 2.0 spec, enforced here
/// by the constructors rather than by the wire enum shape (simpler to
/// serialize than an internally-tagged enum while still impossible to
/// misuse from this crate).
#[derive(Debug, Clone, Serialize)]
pub struct WireResponse {
    pub jsonrpc: &'static str,
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl WireResponse {
    pub fn success(id: Option<RequestId>, result: serde_json::Value) -> Self {
        WireResponse {
            jsonrpc: JSONRPC_VERSION,
            id: id.map(|i| serde_json::to_value(i).unwrap_or(serde_json::Value::Null))
                .unwrap_or(serde_json::Value::Null),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<RequestId>, error: WireError) -> Self {
        WireResponse {
            jsonrpc: JSONRPC_VERSION,
            id: id.map(|i| serde_json::to_value(i).unwrap_or(serde_json::Value::Null))
                .unwrap_or(serde_json::Value::Null),
            result: None,
            error: Some(error),
        }
    }
}

/// A server-initiated notification, such as `server/busy`. Carries no `id`
/// and expects no response.
#[derive(Debug, Clone, Serialize)]
pub struct WireNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl WireNotification {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        WireNotification {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params,
        }
    }
}
