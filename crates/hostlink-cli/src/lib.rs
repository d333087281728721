//! Bridge between a stdio tool-invocation client and the host command socket.
//!
//! The `hostlink-mcp` binary reads newline-delimited JSON-RPC 2.0 messages on
//! stdin and answers on stdout. Each `tools/call` becomes one command frame
//! sent through a [`BridgeClient`], which keeps a single persistent
//! connection to the host and reconnects after any failure.

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use hostlink_config::{Config, ConfigArgs, telemetry};

mod client;
mod errors;
pub mod mcp;
mod transport;

pub use client::{BridgeClient, CommandTransport};
pub use errors::{ClientError, McpError};
pub use mcp::McpServer;

/// Stdio tool-protocol bridge to the host command socket.
#[derive(Debug, Parser)]
#[command(name = "hostlink-mcp", version)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
    /// Print the tool catalogue as JSON and exit.
    #[arg(long)]
    list_tools: bool,
}

/// Runs the bridge with explicit arguments and streams.
///
/// Log output goes to stderr; `stdout` carries protocol messages only.
pub fn run<I, T, R, W, E>(args: I, input: R, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    R: BufRead,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) if error.use_stderr() => {
            let _ = write!(stderr, "{error}");
            return ExitCode::from(2);
        }
        Err(error) => {
            let _ = write!(stdout, "{error}");
            return ExitCode::SUCCESS;
        }
    };

    if cli.list_tools {
        return match serde_json::to_string_pretty(&mcp::catalogue()) {
            Ok(catalogue) => report(writeln!(stdout, "{catalogue}"), stderr),
            Err(error) => {
                let _ = writeln!(stderr, "hostlink-mcp: {error}");
                ExitCode::FAILURE
            }
        };
    }

    let config = match Config::try_from(cli.config) {
        Ok(config) => config,
        Err(error) => {
            let _ = writeln!(stderr, "hostlink-mcp: {error}");
            return ExitCode::from(2);
        }
    };
    if let Err(error) = telemetry::initialise(&config) {
        let _ = writeln!(stderr, "hostlink-mcp: {error}");
        return ExitCode::FAILURE;
    }

    let mut server = McpServer::new(BridgeClient::from_config(&config));
    match server.serve(input, stdout) {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = writeln!(stderr, "hostlink-mcp: {error}");
            ExitCode::FAILURE
        }
    }
}

fn report<E: Write>(outcome: std::io::Result<()>, stderr: &mut E) -> ExitCode {
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = writeln!(stderr, "hostlink-mcp: failed to write output: {error}");
            ExitCode::FAILURE
        }
    }
}
