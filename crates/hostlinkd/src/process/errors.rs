//! Defines the error surface for host launch and supervision.

use thiserror::Error;

use crate::server::ServerError;

use super::shutdown::ShutdownError;

/// Errors surfaced while launching or supervising the host process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The command server failed to start or stop.
    #[error("command server error: {source}")]
    Server {
        /// Underlying server error.
        #[from]
        source: ServerError,
    },
    /// Waiting for the shutdown signal failed.
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        /// Underlying signal error.
        #[from]
        source: ShutdownError,
    },
    /// The shutdown watcher thread could not be spawned.
    #[error("failed to spawn shutdown watcher: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The shutdown watcher thread panicked.
    #[error("shutdown watcher thread panicked")]
    WatcherPanic,
}
