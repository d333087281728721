//! Command envelope exchanged between the bridge and the host.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::codec::FrameError;

/// Parameter mapping carried by a command.
pub type Params = serde_json::Map<String, Value>;

/// A named command plus its opaque parameters.
///
/// The name travels as the `type` field on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Command name used to look up the host handler.
    #[serde(rename = "type")]
    pub name: String,
    /// Parameters forwarded verbatim to the handler.
    #[serde(default, deserialize_with = "params_or_empty")]
    pub params: Params,
}

impl Command {
    /// Builds a command with no parameters.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Params::new(),
        }
    }

    /// Builds a command with the supplied parameter mapping.
    #[must_use]
    pub fn with_params(name: impl Into<String>, params: Params) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Adds a single parameter, replacing any previous value for `key`.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Interprets a decoded frame as a command.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidCommand`] when the value is not an object
    /// with a string `type` field and an object (or null) `params` field.
    pub fn from_value(value: Value) -> Result<Self, FrameError> {
        serde_json::from_value(value).map_err(|source| FrameError::InvalidCommand { source })
    }
}

fn params_or_empty<'de, D>(deserializer: D) -> Result<Params, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Params>::deserialize(deserializer).map(Option::unwrap_or_default)
}
