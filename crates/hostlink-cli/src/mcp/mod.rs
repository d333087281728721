//! Stdio tool-protocol adapter.
//!
//! Speaks newline-delimited JSON-RPC 2.0 on stdin/stdout and turns each
//! `tools/call` into exactly one command frame on the host socket.

mod protocol;
mod server;
mod tools;

pub use self::protocol::{
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION, RpcError,
    RpcResponse,
};
pub use self::server::McpServer;
pub use self::tools::{Tool, catalogue, find};
