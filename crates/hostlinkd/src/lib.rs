//! In-host command server.
//!
//! `hostlinkd` embeds a socket server inside a host application whose state
//! may only be touched from one thread. Clients connect over TCP or a Unix
//! socket and send JSON command frames; each connection runs on its own
//! thread, but every command is executed on the host thread through the
//! [`ExecutionBridge`], which blocks the caller until the host has run the
//! command or the timeout has elapsed.
//!
//! The layers are:
//!
//! 1. [`transport`]: binds the endpoint and accepts connections.
//! 2. [`dispatch`]: per-connection framing state machine and the
//!    [`HandlerRegistry`] that maps command names to handlers.
//! 3. [`execution`]: hands resolved commands to the [`HostLoop`] and waits.
//! 4. [`scene`]: the demonstration host state and its handlers.
//!
//! [`run_host`] wires these together around an in-memory scene and serves
//! until a termination signal arrives.

pub mod dispatch;
pub mod execution;
mod health;
mod host;
mod process;
pub mod scene;
mod server;
pub mod transport;

pub use dispatch::{
    Capability, CommandConnectionHandler, CommandHandler, DispatchError, HandlerError,
    HandlerRegistry, RegistryBuilder,
};
pub use execution::ExecutionBridge;
pub use health::{HealthReporter, StructuredHealthReporter};
pub use host::{HostLoop, HostScheduler, HostStopped, HostTask, TickOutcome};
pub use process::{
    ChannelShutdownSignal, HostOptions, LaunchError, ShutdownError, ShutdownSignal,
    SystemShutdownSignal, run_host, run_host_with,
};
pub use server::{Server, ServerError, ServerState};

#[cfg(test)]
mod tests;
