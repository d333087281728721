//! Per-connection read/decode/dispatch/write state machine.

use std::io::{self, Read, Write};

use hostlink_wire::{Command, FrameDecoder, FrameError, Response, write_frame};
use serde_json::Value;
use tracing::{debug, warn};

use crate::execution::ExecutionBridge;

use super::DISPATCH_TARGET;

const READ_CHUNK_BYTES: usize = 4096;

#[derive(Debug)]
enum ConnectionState {
    Reading,
    Decoding,
    Dispatching(Value),
    Writing(Response),
    Rejecting(Response),
    Closed,
}

/// Serves one client until it disconnects or sends unrecoverable input.
///
/// Frames are handled strictly in arrival order: each response is written
/// and flushed before the next buffered frame is decoded.
pub(crate) struct CommandConnection<'a, S, H> {
    stream: S,
    decoder: FrameDecoder,
    bridge: &'a ExecutionBridge<H>,
    id: u64,
    answered: u64,
}

impl<'a, S, H> CommandConnection<'a, S, H>
where
    S: Read + Write,
    H: 'static,
{
    pub(crate) const fn new(
        stream: S,
        bridge: &'a ExecutionBridge<H>,
        max_frame_bytes: usize,
        id: u64,
    ) -> Self {
        Self {
            stream,
            decoder: FrameDecoder::with_limit(max_frame_bytes),
            bridge,
            id,
            answered: 0,
        }
    }

    /// Drives the connection to completion and returns the number of
    /// responses written.
    pub(crate) fn serve(mut self) -> u64 {
        let mut state = ConnectionState::Reading;
        loop {
            state = match state {
                ConnectionState::Reading => self.read(),
                ConnectionState::Decoding => self.decode(),
                ConnectionState::Dispatching(value) => {
                    ConnectionState::Writing(self.dispatch(value))
                }
                ConnectionState::Writing(response) => {
                    self.write(&response, ConnectionState::Decoding)
                }
                ConnectionState::Rejecting(response) => {
                    self.write(&response, ConnectionState::Closed)
                }
                ConnectionState::Closed => break,
            };
        }
        debug!(
            target: DISPATCH_TARGET,
            connection = self.id,
            answered = self.answered,
            "connection closed"
        );
        self.answered
    }

    fn read(&mut self) -> ConnectionState {
        let mut chunk = [0_u8; READ_CHUNK_BYTES];
        match read_with_retry(&mut self.stream, &mut chunk) {
            Ok(0) => {
                if !self.decoder.is_empty() {
                    debug!(
                        target: DISPATCH_TARGET,
                        connection = self.id,
                        pending = self.decoder.buffered().len(),
                        "client disconnected mid-frame"
                    );
                }
                ConnectionState::Closed
            }
            Ok(read) => match self.decoder.push(chunk.get(..read).unwrap_or_default()) {
                Ok(()) => ConnectionState::Decoding,
                Err(error) => self.reject(&error),
            },
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    connection = self.id,
                    %error,
                    "failed to read from connection"
                );
                ConnectionState::Closed
            }
        }
    }

    fn decode(&mut self) -> ConnectionState {
        match self.decoder.decode() {
            Ok(Some(value)) => ConnectionState::Dispatching(value),
            Ok(None) => ConnectionState::Reading,
            Err(error) => self.reject(&error),
        }
    }

    fn dispatch(&self, value: Value) -> Response {
        match Command::from_value(value) {
            Ok(command) => {
                debug!(
                    target: DISPATCH_TARGET,
                    connection = self.id,
                    command = %command.name,
                    "dispatching command"
                );
                self.bridge.execute(command)
            }
            Err(FrameError::InvalidCommand { source }) => {
                debug!(
                    target: DISPATCH_TARGET,
                    connection = self.id,
                    error = %source,
                    "frame is not a command"
                );
                Response::error(format!("Invalid command frame: {source}"))
            }
            Err(error) => Response::error(error.to_string()),
        }
    }

    fn write(&mut self, response: &Response, next: ConnectionState) -> ConnectionState {
        match write_frame(&mut self.stream, response) {
            Ok(()) => {
                self.answered += 1;
                next
            }
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    connection = self.id,
                    %error,
                    "failed to write response"
                );
                ConnectionState::Closed
            }
        }
    }

    fn reject(&mut self, error: &FrameError) -> ConnectionState {
        warn!(
            target: DISPATCH_TARGET,
            connection = self.id,
            %error,
            "rejecting connection input"
        );
        self.decoder.clear();
        ConnectionState::Rejecting(Response::error(error.to_string()))
    }
}

fn read_with_retry<S: Read>(stream: &mut S, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match stream.read(buf) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(error),
        }
    }
}
