//! Persistent connection from the bridge process to the host's command socket.

use std::io::{self, Read};
use std::time::Duration;

use hostlink_config::{Config, SocketEndpoint};
use hostlink_wire::{Command, FrameDecoder, Response, write_frame};
use tracing::{debug, warn};

use crate::errors::ClientError;
use crate::transport::{Connection, connect};

const CLIENT_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::client");
const READ_CHUNK_BYTES: usize = 8192;
const READ_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

/// Sends one command and waits for its response.
pub trait CommandTransport {
    /// Exchanges one request/response frame pair with the host.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] for any connection-level failure.
    fn send(&mut self, command: &Command) -> Result<Response, ClientError>;
}

/// Single persistent connection with transparent reconnect.
///
/// Exactly one request is in flight at a time: bytes left over from an
/// earlier exchange are discarded before each send.
#[derive(Debug)]
pub struct BridgeClient {
    endpoint: SocketEndpoint,
    read_timeout: Duration,
    connection: Option<Connection>,
    decoder: FrameDecoder,
}

impl BridgeClient {
    /// Builds a disconnected client.
    ///
    /// Reads wait for `command_timeout` plus ten seconds, so the host's own
    /// timeout response normally arrives before the client gives up.
    #[must_use]
    pub fn new(endpoint: SocketEndpoint, command_timeout: Duration, max_frame_bytes: usize) -> Self {
        Self {
            endpoint,
            read_timeout: command_timeout.saturating_add(READ_TIMEOUT_SLACK),
            connection: None,
            decoder: FrameDecoder::with_limit(max_frame_bytes),
        }
    }

    /// Builds a client for the configured endpoint and limits.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.endpoint().clone(),
            config.command_timeout(),
            config.max_frame_bytes(),
        )
    }

    /// Overrides the socket read timeout.
    #[must_use]
    pub const fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Endpoint this client connects to.
    #[must_use]
    pub const fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Opens the connection unless one is already live.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Resolve`], [`ClientError::Connect`] or
    /// [`ClientError::Configure`] when the socket cannot be set up.
    pub fn connect(&mut self) -> Result<(), ClientError> {
        if self.connection.is_some() {
            return Ok(());
        }
        let connection = connect(&self.endpoint)?;
        connection
            .set_read_timeout(self.read_timeout)
            .map_err(|source| ClientError::Configure { source })?;
        debug!(
            target: CLIENT_TARGET,
            endpoint = %self.endpoint,
            "connected to host"
        );
        self.connection = Some(connection);
        Ok(())
    }

    /// Whether a connection is currently held.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Drops the connection and any buffered bytes.
    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            debug!(
                target: CLIENT_TARGET,
                endpoint = %self.endpoint,
                "disconnected from host"
            );
        }
        self.decoder.clear();
    }

    /// Sends `command` and returns the host's response.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] on any IO, framing or decode failure; the
    /// connection is torn down and re-established on the next call.
    pub fn send(&mut self, command: &Command) -> Result<Response, ClientError> {
        self.connect()?;
        self.decoder.clear();
        let outcome = self.exchange(command);
        if let Err(error) = &outcome {
            warn!(
                target: CLIENT_TARGET,
                endpoint = %self.endpoint,
                command = %command.name,
                %error,
                "command exchange failed; dropping connection"
            );
            self.disconnect();
        }
        outcome
    }

    fn exchange(&mut self, command: &Command) -> Result<Response, ClientError> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(ClientError::Closed);
        };
        write_frame(connection, command).map_err(|source| ClientError::Send { source })?;

        let mut chunk = [0_u8; READ_CHUNK_BYTES];
        loop {
            if let Some(value) = self.decoder.decode()? {
                return serde_json::from_value(value)
                    .map_err(|source| ClientError::InvalidResponse { source });
            }
            let read = read_chunk(connection, &mut chunk, self.read_timeout)?;
            if read == 0 {
                return Err(ClientError::Closed);
            }
            self.decoder.push(chunk.get(..read).unwrap_or_default())?;
        }
    }
}

impl CommandTransport for BridgeClient {
    fn send(&mut self, command: &Command) -> Result<Response, ClientError> {
        Self::send(self, command)
    }
}

fn read_chunk(
    connection: &mut Connection,
    chunk: &mut [u8],
    read_timeout: Duration,
) -> Result<usize, ClientError> {
    loop {
        match connection.read(chunk) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                return Err(ClientError::Timeout {
                    waited: read_timeout,
                });
            }
            Err(source) => return Err(ClientError::Receive { source }),
        }
    }
}
