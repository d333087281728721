//! Shared configuration for the host command server and its external bridge.
//!
//! Both binaries flatten [`ConfigArgs`] into their command line. Every flag
//! has an environment override, so precedence is command line, then
//! environment, then the defaults in [`defaults`]. The parsed arguments are
//! validated into a [`Config`] that the rest of the workspace consumes.

use std::ffi::OsString;
use std::time::Duration;

use clap::{Args, Parser};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod defaults;
mod logging;
mod socket;
pub mod telemetry;

pub use defaults::{
    DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_HOST, DEFAULT_LOG_FILTER, DEFAULT_MAX_FRAME_BYTES,
    DEFAULT_PORT, default_command_timeout, default_log_filter, default_log_format,
    default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Command-line and environment inputs shared by the binaries.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Full socket endpoint, for example `tcp://127.0.0.1:9876` or
    /// `unix:///run/hostlink/host.sock`. Overrides `--host` and `--port`.
    #[arg(long, env = "HOSTLINK_ENDPOINT", value_name = "URL")]
    pub endpoint: Option<SocketEndpoint>,
    /// Host name of the command socket.
    #[arg(long, env = "HOSTLINK_HOST", default_value = DEFAULT_HOST)]
    pub host: String,
    /// TCP port of the command socket.
    #[arg(long, env = "HOSTLINK_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Tracing filter expression, for example `info,hostlinkd=debug`.
    #[arg(long, env = "HOSTLINK_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,
    /// Log output format (`json` or `compact`).
    #[arg(long, env = "HOSTLINK_LOG_FORMAT", default_value_t = default_log_format())]
    pub log_format: LogFormat,
    /// Seconds a caller waits for the host to execute a command.
    #[arg(
        long,
        env = "HOSTLINK_COMMAND_TIMEOUT_SECS",
        default_value_t = DEFAULT_COMMAND_TIMEOUT_SECS
    )]
    pub command_timeout_secs: u64,
    /// Largest frame, in bytes, accepted on a connection.
    #[arg(long, env = "HOSTLINK_MAX_FRAME_BYTES", default_value_t = DEFAULT_MAX_FRAME_BYTES)]
    pub max_frame_bytes: usize,
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Socket the host listens on and the bridge connects to.
    pub endpoint: SocketEndpoint,
    /// Tracing filter expression.
    pub log_filter: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// Seconds a caller waits for the host to execute a command.
    pub command_timeout_secs: u64,
    /// Largest frame accepted on a connection.
    pub max_frame_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_socket_endpoint(),
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: default_log_format(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Command-line parsing failed (includes `--help` and `--version`).
    #[error(transparent)]
    Cli(#[from] clap::Error),
    /// The command timeout was zero.
    #[error("command timeout must be at least one second")]
    ZeroTimeout,
    /// The frame limit was zero.
    #[error("maximum frame size must be greater than zero")]
    ZeroFrameLimit,
}

#[derive(Debug, Parser)]
#[command(name = "hostlink")]
struct ConfigCli {
    #[command(flatten)]
    config: ConfigArgs,
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_iter(std::env::args_os())
    }

    /// Loads configuration from an explicit argument list and the environment.
    ///
    /// The first item is treated as the program name.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = ConfigCli::try_parse_from(args)?;
        Self::try_from(cli.config)
    }

    /// Socket the host listens on and the bridge connects to.
    #[must_use]
    pub const fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Bound on how long a caller waits for the host to run a command.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Largest frame accepted on a connection.
    #[must_use]
    pub const fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }
}

impl TryFrom<ConfigArgs> for Config {
    type Error = ConfigError;

    fn try_from(args: ConfigArgs) -> Result<Self, Self::Error> {
        if args.command_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if args.max_frame_bytes == 0 {
            return Err(ConfigError::ZeroFrameLimit);
        }
        let endpoint = args
            .endpoint
            .unwrap_or_else(|| SocketEndpoint::tcp(args.host, args.port));
        Ok(Self {
            endpoint,
            log_filter: args.log_filter,
            log_format: args.log_format,
            command_timeout_secs: args.command_timeout_secs,
            max_frame_bytes: args.max_frame_bytes,
        })
    }
}
