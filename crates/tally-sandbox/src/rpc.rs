//! JSON-RPC 2.0 frame types for the bridge wire protocol.
//!
//! One UTF-8 JSON object per line, no embedded newlines. A frame with a
//! `method` is a request (or, without an id, a notification); a frame with
//! `result` or `error` is a response. `result` is serialized even when its
//! value is null - counterparts that distinguish "missing field" from
//! "explicit null" starve on an omitted result.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error code for an unknown method or primitive.
pub const CODE_UNKNOWN_METHOD: i64 = -32601;

/// Error code for a primitive handler failure.
pub const CODE_HANDLER_ERROR: i64 = -32000;

/// An outgoing request or notification.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Method name.
    pub method: String,
    /// Parameters object, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Request id; `None` makes this a notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl Request {
    /// A request with an id, expecting a response.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params: Some(params),
            id: Some(id),
        }
    }

    /// A fire-and-forget notification.
    #[must_use]
    pub fn notification(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params: None,
            id: None,
        }
    }
}

/// An outgoing response. `result` is always present on success, even when
/// the logical answer is null.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// The result value; serialized even when null.
    pub result: Value,
    /// The error, when the call failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    /// Echo of the request id.
    pub id: Value,
}

impl Response {
    /// A success response.
    #[must_use]
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result,
            error: None,
            id,
        }
    }

    /// An error response.
    #[must_use]
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Value::Null,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// An incoming frame before classification. A frame with a method is a
/// request from the child; one with a result or error is a response to us.
#[derive(Debug, Clone, Deserialize)]
pub struct Frame {
    /// Method name, present on requests.
    #[serde(default)]
    pub method: Option<String>,
    /// Parameters, present on requests.
    #[serde(default)]
    pub params: Option<Value>,
    /// Result, present on success responses. A present-but-null result is
    /// `Some(Value::Null)`, distinct from an absent field - an explicit
    /// null is a real answer.
    #[serde(default, deserialize_with = "present_value")]
    pub result: Option<Value>,
    /// Error, present on failure responses.
    #[serde(default)]
    pub error: Option<RpcError>,
    /// Correlation id.
    #[serde(default)]
    pub id: Option<Value>,
}

impl Frame {
    /// Whether this frame is a response to one of our requests.
    #[must_use]
    pub fn is_response(&self) -> bool {
        self.method.is_none() && (self.result.is_some() || self.error.is_some())
    }
}

/// Deserialize a field that was present, keeping JSON null as a value.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Parameters of a primitive callback: optional ordered `args` and named
/// `kwargs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Keyword arguments.
    #[serde(default)]
    pub kwargs: serde_json::Map<String, Value>,
}

/// Canonicalize a wire id to an integer. Some JSON stacks deliver integer
/// ids as floats; both forms must hit the same in-flight table key.
#[must_use]
pub fn id_as_u64(id: &Value) -> Option<u64> {
    match id {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                Some(v)
            } else {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            }
        }
        _ => None,
    }
}
