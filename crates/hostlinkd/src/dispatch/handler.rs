//! Transport adapter that serves accepted streams with the command protocol.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::execution::ExecutionBridge;
use crate::transport::{ConnectionHandler, ConnectionStream};

use super::DISPATCH_TARGET;
use super::connection::CommandConnection;

/// Runs every accepted connection through the command state machine.
///
/// Each connection is served on its own thread; commands from all
/// connections meet only in the host loop's queue.
pub struct CommandConnectionHandler<H> {
    bridge: ExecutionBridge<H>,
    max_frame_bytes: usize,
    next_id: AtomicU64,
}

impl<H> fmt::Debug for CommandConnectionHandler<H> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CommandConnectionHandler")
            .field("bridge", &self.bridge)
            .field("max_frame_bytes", &self.max_frame_bytes)
            .finish_non_exhaustive()
    }
}

impl<H: 'static> CommandConnectionHandler<H> {
    /// Builds a handler that forwards commands through `bridge`.
    #[must_use]
    pub const fn new(bridge: ExecutionBridge<H>, max_frame_bytes: usize) -> Self {
        Self {
            bridge,
            max_frame_bytes,
            next_id: AtomicU64::new(1),
        }
    }
}

impl<H: 'static> ConnectionHandler for CommandConnectionHandler<H> {
    fn handle(&self, stream: ConnectionStream) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(
            target: DISPATCH_TARGET,
            connection = id,
            peer = %stream.peer_label(),
            "client connected"
        );
        CommandConnection::new(stream, &self.bridge, self.max_frame_bytes, id).serve();
    }
}
