//! Entry point for the `hostlink-mcp` stdio bridge.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    hostlink_cli::run(std::env::args_os(), stdin, &mut stdout, &mut stderr)
}
