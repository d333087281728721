//! Process-wide `tracing` subscriber for both binaries.
//!
//! Output goes to stderr so stdout stays free for the bridge's protocol
//! stream.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, format::FmtSpan, time::UtcTime};

use crate::{Config, LogFormat};

static INSTALLED: OnceCell<LogFormat> = OnceCell::new();

/// Proof that a subscriber is installed, carrying the format in use.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryHandle {
    format: LogFormat,
}

impl TelemetryHandle {
    /// Format chosen by the first successful initialisation.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }
}

/// Telemetry could not be set up.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The filter directive did not parse.
    #[error("invalid log filter '{directive}': {reason}")]
    Filter {
        /// Directive as configured.
        directive: String,
        /// Parser message.
        reason: String,
    },
    /// Another subscriber was already installed globally.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Installs the global subscriber described by `config`.
///
/// Only the first call has an effect; later calls report the format that
/// was installed.
///
/// # Errors
///
/// Returns a [`TelemetryError`] for a malformed filter or when a foreign
/// subscriber already owns the global slot.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED
        .get_or_try_init(|| install(config).map(|()| config.log_format()))
        .map(|format| TelemetryHandle { format: *format })
}

fn parse_filter(directive: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(directive).map_err(|error| TelemetryError::Filter {
        directive: directive.to_owned(),
        reason: error.to_string(),
    })
}

fn install(config: &Config) -> Result<(), TelemetryError> {
    let filter = parse_filter(config.log_filter())?;
    let base = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_thread_names(true)
        .with_span_events(FmtSpan::NONE)
        .with_timer(UtcTime::rfc_3339());
    match config.log_format() {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(base.json().flatten_event(true).finish())?;
        }
        LogFormat::Compact => {
            tracing::subscriber::set_global_default(base.compact().finish())?;
        }
    }
    Ok(())
}
