//! Wires the scene host, execution bridge and command server together.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::info;

use hostlink_config::Config;

use crate::dispatch::CommandConnectionHandler;
use crate::execution::ExecutionBridge;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::host::HostLoop;
use crate::scene::{self, Scene};
use crate::server::Server;

use super::errors::LaunchError;
use super::shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
use super::PROCESS_TARGET;

/// Runtime options for the host process.
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// Endpoint, timeout and frame limits.
    pub config: Config,
    /// Enables the privileged `execute_code` command.
    pub allow_execute_code: bool,
    /// Longest idle wait between host ticks.
    pub tick_interval: Duration,
}

impl HostOptions {
    /// Options with scripting disabled and a 10 ms tick.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self {
            config,
            allow_execute_code: false,
            tick_interval: Duration::from_millis(10),
        }
    }
}

/// Runs the host until a termination signal arrives.
///
/// # Errors
///
/// Returns a [`LaunchError`] if the server cannot start or stop, or if the
/// signal handlers cannot be installed.
pub fn run_host(options: HostOptions) -> Result<(), LaunchError> {
    let shutdown = SystemShutdownSignal::default();
    let reporter = Arc::new(StructuredHealthReporter::new());
    run_host_with(options, shutdown, reporter).map(|_| ())
}

/// Runs the host with injected collaborators and returns the final scene.
///
/// The calling thread becomes the host thread: it ticks the scene until
/// `shutdown` fires, then stops the server.
///
/// # Errors
///
/// See [`run_host`].
pub fn run_host_with<S>(
    options: HostOptions,
    shutdown: S,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Scene, LaunchError>
where
    S: ShutdownSignal + 'static,
{
    let HostOptions {
        config,
        allow_execute_code,
        tick_interval,
    } = options;
    info!(
        target: PROCESS_TARGET,
        endpoint = %config.endpoint(),
        allow_execute_code,
        timeout_secs = config.command_timeout().as_secs(),
        "starting host runtime"
    );

    let registry = Arc::new(scene::registry(allow_execute_code));
    let mut host = HostLoop::new(Scene::default());
    let bridge = ExecutionBridge::new(host.scheduler(), registry, config.command_timeout());
    let handler = Arc::new(CommandConnectionHandler::new(
        bridge,
        config.max_frame_bytes(),
    ));
    let mut server = Server::new(config.endpoint().clone(), handler, reporter);
    server.start()?;

    let stop = Arc::new(AtomicBool::new(false));
    let watcher = spawn_watcher(shutdown, Arc::clone(&stop))?;
    let executed = host.run_until(&stop, tick_interval);

    server.stop()?;
    watcher.join().map_err(|_| LaunchError::WatcherPanic)??;
    info!(
        target: PROCESS_TARGET,
        executed,
        "shutdown sequence completed"
    );
    Ok(host.into_state())
}

fn spawn_watcher<S>(
    shutdown: S,
    stop: Arc<AtomicBool>,
) -> Result<thread::JoinHandle<Result<(), ShutdownError>>, LaunchError>
where
    S: ShutdownSignal + 'static,
{
    thread::Builder::new()
        .name(String::from("hostlink-signals"))
        .spawn(move || {
            let outcome = shutdown.wait();
            // Stop the host even when the signal listener failed.
            stop.store(true, Ordering::SeqCst);
            outcome
        })
        .map_err(|source| LaunchError::Spawn { source })
}
