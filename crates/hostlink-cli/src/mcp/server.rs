//! Newline-delimited JSON-RPC loop that forwards tool calls to the host.

use std::io::{BufRead, Write};

use hostlink_wire::{Command, Response};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::client::CommandTransport;
use crate::errors::McpError;

use super::protocol::{
    INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION, Request, RpcError,
    RpcResponse,
};
use super::tools;

const MCP_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::mcp");
const SERVER_NAME: &str = "hostlink-mcp";

/// Tool-protocol server backed by a [`CommandTransport`].
#[derive(Debug)]
pub struct McpServer<T> {
    transport: T,
    initialized: bool,
}

impl<T: CommandTransport> McpServer<T> {
    /// Wraps `transport`; no connection is made until the first tool call.
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            initialized: false,
        }
    }

    /// Transport used for tool calls.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether the client has completed the initialisation handshake.
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Serves messages from `input` until end of input.
    ///
    /// Returns the number of responses written.
    ///
    /// # Errors
    ///
    /// Returns an [`McpError`] when reading or writing the streams fails.
    pub fn serve<R, W>(&mut self, mut input: R, output: &mut W) -> Result<u64, McpError>
    where
        R: BufRead,
        W: Write + ?Sized,
    {
        info!(target: MCP_TARGET, "tool protocol server started");
        let mut written = 0_u64;
        let mut line = String::new();
        loop {
            line.clear();
            let read = input
                .read_line(&mut line)
                .map_err(|source| McpError::Read { source })?;
            if read == 0 {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line) {
                let mut bytes = serde_json::to_vec(&response)?;
                bytes.push(b'\n');
                output
                    .write_all(&bytes)
                    .and_then(|()| output.flush())
                    .map_err(|source| McpError::Write { source })?;
                written += 1;
            }
        }
        info!(target: MCP_TARGET, responses = written, "tool protocol input closed");
        Ok(written)
    }

    /// Handles one message; notifications yield `None`.
    pub fn handle_line(&mut self, line: &str) -> Option<RpcResponse> {
        let value = match serde_json::from_str::<Value>(line) {
            Ok(value) => value,
            Err(error) => {
                warn!(target: MCP_TARGET, %error, "unparseable protocol message");
                return Some(RpcResponse::error(
                    Value::Null,
                    RpcError::new(PARSE_ERROR, format!("Parse error: {error}")),
                ));
            }
        };
        let request = match Request::from_value(value) {
            Ok(request) => request,
            Err((id, error)) => return Some(RpcResponse::error(id, error)),
        };
        debug!(
            target: MCP_TARGET,
            method = %request.method,
            notification = request.id.is_none(),
            "protocol message received"
        );
        let outcome = self.dispatch(&request.method, request.params);
        let id = request.id?;
        Some(match outcome {
            Ok(result) => RpcResponse::result(id, result),
            Err(error) => RpcResponse::error(id, error),
        })
    }

    fn dispatch(&mut self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(Self::initialize(&params)),
            "notifications/initialized" | "initialized" => {
                self.initialized = true;
                Ok(Value::Null)
            }
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tools::catalogue() })),
            "tools/call" => self.call_tool(params),
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        }
    }

    fn initialize(params: &Value) -> Value {
        let version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);
        json!({
            "protocolVersion": version,
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
        })
    }

    fn call_tool(&mut self, params: Value) -> Result<Value, RpcError> {
        let Value::Object(mut params) = params else {
            return Err(invalid_params("tools/call params must be an object"));
        };
        let Some(Value::String(name)) = params.remove("name") else {
            return Err(invalid_params("tools/call requires a tool name"));
        };
        let tool = tools::find(&name)
            .ok_or_else(|| invalid_params(format!("Unknown tool: {name}")))?;
        let arguments = match params.remove("arguments") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(arguments)) => arguments,
            Some(_) => return Err(invalid_params("tool arguments must be an object")),
        };
        if let Some(missing) = tool.required().find(|key| !arguments.contains_key(*key)) {
            return Err(invalid_params(format!(
                "Missing required argument '{missing}' for tool '{name}'"
            )));
        }

        let command = Command::with_params(name, arguments);
        Ok(match self.transport.send(&command) {
            Ok(response) => tool_result(&response),
            Err(error) => {
                warn!(
                    target: MCP_TARGET,
                    tool = %command.name,
                    %error,
                    "host unreachable"
                );
                text_content(format!("Failed to reach host: {error}"), true)
            }
        })
    }
}

fn invalid_params(message: impl Into<String>) -> RpcError {
    RpcError::new(INVALID_PARAMS, message)
}

fn tool_result(response: &Response) -> Value {
    if let Some(result) = response.result() {
        let text = serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string());
        return text_content(text, false);
    }
    let message = response.message().unwrap_or("Unknown error");
    let text = match response.traceback() {
        Some(traceback) => format!("Error: {message}\n\n{traceback}"),
        None => format!("Error: {message}"),
    };
    text_content(text, true)
}

fn text_content(text: String, is_error: bool) -> Value {
    json!({
        "content": [{"type": "text", "text": text}],
        "isError": is_error,
    })
}
