use std::time::Duration;

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Default host name for the command socket.
pub const DEFAULT_HOST: &str = "localhost";

/// Default TCP port for the command socket.
pub const DEFAULT_PORT: u16 = 9876;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default bound on how long a caller waits for the host to run a command.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 180;

/// Default upper bound for a single buffered frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = hostlink_wire::DEFAULT_MAX_FRAME_BYTES;

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default command execution timeout.
#[must_use]
pub const fn default_command_timeout() -> Duration {
    Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS)
}

/// Computes the default socket endpoint for the host server.
#[must_use]
pub fn default_socket_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp(DEFAULT_HOST, DEFAULT_PORT)
}
