//! Response envelope returned by the host for every decoded command.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a single command.
///
/// The `status` tag selects the variant, so a success never carries a
/// message and an error never carries a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// The handler completed and produced a result.
    Success {
        /// Handler result; `null` when the handler returned nothing.
        #[serde(default)]
        result: Value,
    },
    /// The command failed before, during, or after execution.
    Error {
        /// Human-readable failure description.
        message: String,
        /// Optional diagnostic trace captured at the failure site.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        traceback: Option<String>,
    },
}

impl Response {
    /// Builds a success response.
    #[must_use]
    pub const fn success(result: Value) -> Self {
        Self::Success { result }
    }

    /// Builds an error response without a diagnostic trace.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            traceback: None,
        }
    }

    /// Builds an error response carrying a diagnostic trace.
    #[must_use]
    pub fn error_with_traceback(message: impl Into<String>, traceback: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            traceback: Some(traceback.into()),
        }
    }

    /// Returns `true` for success responses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the result of a success response.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        match self {
            Self::Success { result } => Some(result),
            Self::Error { .. } => None,
        }
    }

    /// Returns the message of an error response.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Error { message, .. } => Some(message.as_str()),
        }
    }

    /// Returns the diagnostic trace of an error response, when present.
    #[must_use]
    pub fn traceback(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Error { traceback, .. } => traceback.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_wire_shape() {
        let response = Response::success(json!({"deleted": "Cube"}));
        let encoded = serde_json::to_value(&response).expect("serialise");
        assert_eq!(
            encoded,
            json!({"status": "success", "result": {"deleted": "Cube"}})
        );
    }

    #[test]
    fn error_wire_shape_omits_missing_traceback() {
        let response = Response::error("Unknown command: frobnicate");
        let encoded = serde_json::to_string(&response).expect("serialise");
        assert_eq!(
            encoded,
            r#"{"status":"error","message":"Unknown command: frobnicate"}"#
        );
    }

    #[test]
    fn error_with_traceback_round_trips() {
        let response = Response::error_with_traceback("boom", "at handler");
        let encoded = serde_json::to_vec(&response).expect("serialise");
        let decoded: Response = serde_json::from_slice(&encoded).expect("deserialise");
        assert_eq!(decoded.message(), Some("boom"));
        assert_eq!(decoded.traceback(), Some("at handler"));
        assert!(!decoded.is_success());
    }

    #[test]
    fn success_without_result_defaults_to_null() {
        let decoded: Response =
            serde_json::from_str(r#"{"status":"success"}"#).expect("deserialise");
        assert_eq!(decoded.result(), Some(&Value::Null));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let decoded = serde_json::from_str::<Response>(r#"{"status":"pending"}"#);
        assert!(decoded.is_err());
    }
}
