//! Error types for the bridge client and the tool-protocol adapter.

use std::io;
use std::time::Duration;

use hostlink_wire::FrameError;
use thiserror::Error;

/// Connection-level failures raised by [`crate::BridgeClient`].
///
/// Every variant leaves the client disconnected; the next send reconnects.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint host name did not resolve.
    #[error("failed to resolve host address {endpoint}: {source}")]
    Resolve {
        /// Endpoint being resolved.
        endpoint: String,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },
    /// Opening the connection failed.
    #[error("failed to connect to host at {endpoint}: {source}")]
    Connect {
        /// Endpoint being connected to.
        endpoint: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// Unix sockets are unavailable on this platform.
    #[cfg(not(unix))]
    #[error("platform does not support Unix sockets: {0}")]
    UnsupportedUnixTransport(String),
    /// Configuring the socket read timeout failed.
    #[error("failed to configure connection: {source}")]
    Configure {
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// Writing the command frame failed.
    #[error("failed to send command: {source}")]
    Send {
        /// Underlying framing or IO error.
        #[source]
        source: FrameError,
    },
    /// Reading from the connection failed.
    #[error("failed to read response: {source}")]
    Receive {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// No complete response arrived within the read timeout.
    #[error("no response from host within {} seconds", waited.as_secs())]
    Timeout {
        /// Read timeout that elapsed.
        waited: Duration,
    },
    /// The host closed the connection before a full response arrived.
    #[error("connection closed by host before a complete response was received")]
    Closed,
    /// The response bytes were not valid JSON or exceeded the frame limit.
    #[error("invalid response frame: {source}")]
    Frame {
        /// Underlying codec error.
        #[from]
        source: FrameError,
    },
    /// The response was JSON but not a response object.
    #[error("unexpected response shape: {source}")]
    InvalidResponse {
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

/// Failures of the stdio tool-protocol loop itself.
///
/// Protocol-level problems with individual messages are answered with
/// JSON-RPC errors instead.
#[derive(Debug, Error)]
pub enum McpError {
    /// Reading a message from stdin failed.
    #[error("failed to read protocol input: {source}")]
    Read {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing a message to stdout failed.
    #[error("failed to write protocol output: {source}")]
    Write {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Serialising an outgoing message failed.
    #[error("failed to serialise protocol message: {source}")]
    Serialise {
        /// Underlying serialisation error.
        #[from]
        source: serde_json::Error,
    },
}
