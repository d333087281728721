//! JSON-RPC 2.0 message shapes used on stdin/stdout.

use serde::Serialize;
use serde_json::{Map, Value};

/// Protocol revision announced when the client does not request one.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub(crate) const JSONRPC_VERSION: &str = "2.0";

/// Input was not valid JSON.
pub const PARSE_ERROR: i64 = -32700;
/// Input was JSON but not a JSON-RPC 2.0 request.
pub const INVALID_REQUEST: i64 = -32600;
/// The method is not implemented.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// The method parameters are invalid.
pub const INVALID_PARAMS: i64 = -32602;

/// A decoded request or notification.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Request {
    /// `None` for notifications, which never receive a reply.
    pub(crate) id: Option<Value>,
    pub(crate) method: String,
    pub(crate) params: Value,
}

impl Request {
    /// Validates the envelope of a parsed message.
    ///
    /// On failure returns the id to answer with (or `null`) and the error.
    pub(crate) fn from_value(value: Value) -> Result<Self, (Value, RpcError)> {
        let Value::Object(mut fields) = value else {
            return Err((
                Value::Null,
                RpcError::new(INVALID_REQUEST, "Invalid Request: expected an object"),
            ));
        };
        let id = fields.remove("id");
        let reply_id = id.clone().unwrap_or(Value::Null);
        if fields.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err((
                reply_id,
                RpcError::new(INVALID_REQUEST, "Invalid Request: jsonrpc must be \"2.0\""),
            ));
        }
        let Some(Value::String(method)) = fields.remove("method") else {
            return Err((
                reply_id,
                RpcError::new(INVALID_REQUEST, "Invalid Request: method must be a string"),
            ));
        };
        let params = fields
            .remove("params")
            .unwrap_or_else(|| Value::Object(Map::new()));
        Ok(Self { id, method, params })
    }
}

/// Error object carried by a failed response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcError {
    /// JSON-RPC error code.
    pub code: i64,
    /// Human-readable description.
    pub message: String,
}

impl RpcError {
    /// Builds an error with `code` and `message`.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Outgoing response envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(flatten)]
    outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Outcome {
    Result(Value),
    Error(RpcError),
}

impl RpcResponse {
    pub(crate) const fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            outcome: Outcome::Result(result),
        }
    }

    pub(crate) const fn error(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            outcome: Outcome::Error(error),
        }
    }

    /// Successful result payload, if any.
    #[must_use]
    pub const fn result_value(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Result(value) => Some(value),
            Outcome::Error(_) => None,
        }
    }

    /// Error payload, if any.
    #[must_use]
    pub const fn error_value(&self) -> Option<&RpcError> {
        match &self.outcome {
            Outcome::Error(error) => Some(error),
            Outcome::Result(_) => None,
        }
    }

    /// Request id this response answers.
    #[must_use]
    pub const fn id(&self) -> &Value {
        &self.id
    }
}
