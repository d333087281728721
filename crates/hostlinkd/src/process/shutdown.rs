//! Triggers that end the host's run loop.

use std::io;
use std::sync::Mutex;
use std::sync::mpsc::Receiver;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

const TERMINATION_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Blocks a watcher thread until the host should stop.
pub trait ShutdownSignal: Send + Sync {
    /// Returns once shutdown has been requested.
    ///
    /// # Errors
    ///
    /// Returns a [`ShutdownError`] when the trigger cannot be armed.
    fn wait(&self) -> Result<(), ShutdownError>;
}

/// A shutdown trigger failed to arm.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Registering the POSIX signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Waits for `SIGTERM`, `SIGINT`, `SIGQUIT` or `SIGHUP`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut signals =
            Signals::new(TERMINATION_SIGNALS).map_err(|source| ShutdownError::Install { source })?;
        let received = signals.forever().next();
        info!(target: PROCESS_TARGET, signal = ?received, "termination signal received");
        Ok(())
    }
}

/// Fires when the paired sender sends or is dropped.
#[derive(Debug)]
pub struct ChannelShutdownSignal {
    trigger: Mutex<Receiver<()>>,
}

impl ChannelShutdownSignal {
    /// Wraps the receiving half of a `()` channel.
    #[must_use]
    pub const fn new(trigger: Receiver<()>) -> Self {
        Self {
            trigger: Mutex::new(trigger),
        }
    }
}

impl ShutdownSignal for ChannelShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let dropped = self
            .trigger
            .lock()
            .map_or(true, |trigger| trigger.recv().is_err());
        info!(target: PROCESS_TARGET, sender_dropped = dropped, "shutdown requested");
        Ok(())
    }
}
