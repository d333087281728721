//! Failures raised while binding or serving the command socket.

use std::io;
use std::net::SocketAddr;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors surfaced by [`SocketListener`](super::SocketListener) and its
/// accept thread.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The TCP host did not resolve to any usable address.
    #[error("cannot resolve command socket address {address}: {source}")]
    Resolve {
        /// `host:port` as configured.
        address: String,
        /// Resolver failure, or `NotFound` when nothing resolved.
        #[source]
        source: io::Error,
    },
    /// Binding the TCP port failed, usually because it is taken.
    #[error("cannot bind command socket on {addr}: {source}")]
    BindTcp {
        /// Resolved address.
        addr: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Binding the Unix socket path failed.
    #[error("cannot bind command socket at {path}: {source}")]
    BindUnix {
        /// Socket path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Unix sockets are not available on this platform.
    #[error("unix sockets are unsupported on this platform ({path})")]
    UnsupportedUnix {
        /// Configured socket path.
        path: Utf8PathBuf,
    },
    /// A live host already answers on the socket path.
    #[error("another host is already serving {path}")]
    UnixInUse {
        /// Socket path.
        path: Utf8PathBuf,
    },
    /// Something other than a socket occupies the path.
    #[error("{path} exists and is not a socket")]
    UnixNotSocket {
        /// Socket path.
        path: Utf8PathBuf,
    },
    /// A leftover socket file could not be inspected or removed.
    #[error("cannot reclaim stale socket {path}: {source}")]
    StaleSocket {
        /// Socket path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Switching the socket to non-blocking accepts failed.
    #[error("cannot configure command socket: {source}")]
    Configure {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The accept thread could not be spawned.
    #[error("cannot spawn accept thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The accept thread panicked.
    #[error("accept thread panicked")]
    ThreadPanic,
}
