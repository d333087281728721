//! Host process supervision: runtime wiring and shutdown handling.

mod errors;
pub(crate) mod launch;
pub(crate) mod shutdown;

pub use errors::LaunchError;
pub use launch::{HostOptions, run_host, run_host_with};
pub use shutdown::{
    ChannelShutdownSignal, ShutdownError, ShutdownSignal, SystemShutdownSignal,
};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
