use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use hostlink_config::{Config, ConfigArgs, telemetry};
use hostlinkd::{HostOptions, run_host};

/// In-host command server driving a demonstration scene.
#[derive(Debug, Parser)]
#[command(name = "hostlinkd", version)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
    /// Enable the privileged `execute_code` command.
    #[arg(long, env = "HOSTLINK_ALLOW_EXECUTE_CODE")]
    allow_execute_code: bool,
    /// Longest idle wait between host ticks, in milliseconds.
    #[arg(long, env = "HOSTLINK_TICK_INTERVAL_MS", default_value_t = 10)]
    tick_interval_ms: u64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match Config::try_from(cli.config) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("hostlinkd: {error}");
            return ExitCode::from(2);
        }
    };
    if let Err(error) = telemetry::initialise(&config) {
        eprintln!("hostlinkd: {error}");
        return ExitCode::FAILURE;
    }
    let options = HostOptions {
        config,
        allow_execute_code: cli.allow_execute_code,
        tick_interval: Duration::from_millis(cli.tick_interval_ms.max(1)),
    };
    match run_host(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(target: "hostlinkd::process", error = %error, "host terminated");
            eprintln!("hostlinkd: {error}");
            ExitCode::FAILURE
        }
    }
}
