//! Main-thread execution bridge.
//!
//! Connection threads call [`ExecutionBridge::execute`], which queues the
//! command's handler on the host loop and blocks the caller (never the host)
//! until the host fills the completion slot or the timeout elapses.

mod pending;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hostlink_wire::{Command, Response};
use tracing::{debug, warn};

use crate::dispatch::HandlerRegistry;
use crate::host::HostScheduler;

pub use self::pending::{CompletionSlot, PendingExecution, WaitError};

pub(crate) const EXECUTION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::execution");

/// Message returned when the host does not run a command in time.
pub const TIMEOUT_MESSAGE: &str = "Command execution timeout";
/// Message returned when the host loop has already shut down.
pub const HOST_STOPPED_MESSAGE: &str = "Host tick loop is not running";
/// Message returned when a queued command is dropped without running.
pub const ABANDONED_MESSAGE: &str = "Host tick loop stopped before executing command";

/// Hands commands to the host thread and waits for their responses.
pub struct ExecutionBridge<H> {
    scheduler: HostScheduler<H>,
    registry: Arc<HandlerRegistry<H>>,
    timeout: Duration,
}

impl<H> Clone for ExecutionBridge<H> {
    fn clone(&self) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
            registry: Arc::clone(&self.registry),
            timeout: self.timeout,
        }
    }
}

impl<H> fmt::Debug for ExecutionBridge<H> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ExecutionBridge")
            .field("registry", &self.registry)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<H: 'static> ExecutionBridge<H> {
    /// Builds a bridge over the given scheduler and registry.
    pub const fn new(
        scheduler: HostScheduler<H>,
        registry: Arc<HandlerRegistry<H>>,
        timeout: Duration,
    ) -> Self {
        Self {
            scheduler,
            registry,
            timeout,
        }
    }

    /// Upper bound on how long [`Self::execute`] waits.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `command` on the host thread and returns its response.
    ///
    /// Unknown and disabled commands are answered without involving the
    /// host. On timeout the queued work is not cancelled: it may still run
    /// later, and its result is discarded.
    pub fn execute(&self, command: Command) -> Response {
        let Command { name, params } = command;
        let handler = match self.registry.resolve(&name) {
            Ok(handler) => handler,
            Err(error) => {
                debug!(target: EXECUTION_TARGET, command = %name, %error, "dispatch rejected");
                return Response::error(error.to_string());
            }
        };

        let (waiter, slot) = pending::pending(&name);
        let scheduled = self.scheduler.schedule(move |host: &mut H| {
            let response = handler.invoke(host, &params);
            if !slot.complete(response) {
                debug!(
                    target: EXECUTION_TARGET,
                    command = handler.name(),
                    "discarded result of abandoned command"
                );
            }
        });
        if scheduled.is_err() {
            warn!(target: EXECUTION_TARGET, command = %name, "host loop is not running");
            return Response::error(HOST_STOPPED_MESSAGE);
        }

        match waiter.wait(self.timeout) {
            Ok(response) => {
                debug!(
                    target: EXECUTION_TARGET,
                    command = %name,
                    success = response.is_success(),
                    "command completed"
                );
                response
            }
            Err(WaitError::TimedOut { waited }) => {
                warn!(
                    target: EXECUTION_TARGET,
                    command = %name,
                    waited_ms = waited.as_millis(),
                    "command execution timed out"
                );
                Response::error(TIMEOUT_MESSAGE)
            }
            Err(WaitError::Abandoned) => {
                warn!(target: EXECUTION_TARGET, command = %name, "command dropped before execution");
                Response::error(ABANDONED_MESSAGE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::HandlerError;
    use crate::host::HostLoop;
    use hostlink_wire::Params;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;

    #[derive(Default)]
    struct Probe {
        active: Arc<AtomicUsize>,
        overlaps: Arc<AtomicUsize>,
        calls: u32,
    }

    fn registry() -> Arc<HandlerRegistry<Probe>> {
        Arc::new(
            HandlerRegistry::builder()
                .register("count", |probe: &mut Probe, _params: &Params| {
                    if probe.active.fetch_add(1, Ordering::SeqCst) != 0 {
                        probe.overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(2));
                    probe.calls += 1;
                    probe.active.fetch_sub(1, Ordering::SeqCst);
                    Ok(json!(probe.calls))
                })
                .register("explode", |_probe: &mut Probe, _params: &Params| {
                    Err(HandlerError::new("nope"))
                })
                .register("panic", |_probe: &mut Probe, _params: &Params| {
                    panic!("handler panicked deliberately")
                })
                .build(),
        )
    }

    fn spawn_host(host: HostLoop<Probe>, shutdown: Arc<AtomicBool>) -> thread::JoinHandle<Probe> {
        thread::spawn(move || {
            let mut host = host;
            host.run_until(&shutdown, Duration::from_millis(1));
            host.into_state()
        })
    }

    #[test]
    fn unknown_commands_never_reach_the_host() {
        let host = HostLoop::new(Probe::default());
        let bridge = ExecutionBridge::new(host.scheduler(), registry(), Duration::from_secs(1));
        let response = bridge.execute(Command::new("frobnicate"));
        assert_eq!(response, Response::error("Unknown command: frobnicate"));
    }

    #[test]
    fn stalled_host_yields_timeout_and_late_result_is_discarded() {
        let mut host = HostLoop::new(Probe::default());
        let bridge = ExecutionBridge::new(host.scheduler(), registry(), Duration::from_millis(30));
        let response = bridge.execute(Command::new("count"));
        assert_eq!(response, Response::error(TIMEOUT_MESSAGE));

        // The abandoned task still runs when the host finally ticks.
        assert_eq!(host.tick(), crate::host::TickOutcome::Ran);
        assert_eq!(host.state().calls, 1);
    }

    #[test]
    fn dropped_host_reports_not_running() {
        let host = HostLoop::new(Probe::default());
        let bridge = ExecutionBridge::new(host.scheduler(), registry(), Duration::from_secs(1));
        drop(host);
        let response = bridge.execute(Command::new("count"));
        assert_eq!(response, Response::error(HOST_STOPPED_MESSAGE));
    }

    #[test]
    fn host_dropped_with_queued_command_reports_abandonment() {
        let host = HostLoop::new(Probe::default());
        let bridge = ExecutionBridge::new(host.scheduler(), registry(), Duration::from_secs(10));
        let dropper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            drop(host);
        });
        let response = bridge.execute(Command::new("count"));
        dropper.join().expect("join dropper");
        assert_eq!(response, Response::error(ABANDONED_MESSAGE));
    }

    #[test]
    fn concurrent_callers_never_overlap_on_the_host() {
        let host = HostLoop::new(Probe::default());
        let bridge = ExecutionBridge::new(host.scheduler(), registry(), Duration::from_secs(10));
        let shutdown = Arc::new(AtomicBool::new(false));
        let host_thread = spawn_host(host, Arc::clone(&shutdown));

        let callers: Vec<_> = (0..8)
            .map(|_| {
                let bridge = bridge.clone();
                thread::spawn(move || {
                    (0..5)
                        .map(|_| bridge.execute(Command::new("count")))
                        .filter(Response::is_success)
                        .count()
                })
            })
            .collect();
        let successes: usize = callers
            .into_iter()
            .map(|caller| caller.join().expect("join caller"))
            .sum();

        shutdown.store(true, Ordering::SeqCst);
        let probe = host_thread.join().expect("join host");
        assert_eq!(successes, 40);
        assert_eq!(probe.calls, 40);
        assert_eq!(probe.overlaps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_handler_does_not_stop_the_host() {
        let host = HostLoop::new(Probe::default());
        let bridge = ExecutionBridge::new(host.scheduler(), registry(), Duration::from_secs(10));
        let shutdown = Arc::new(AtomicBool::new(false));
        let host_thread = spawn_host(host, Arc::clone(&shutdown));

        let failed = bridge.execute(Command::new("panic"));
        assert_eq!(failed.message(), Some("handler panicked deliberately"));
        assert!(failed.traceback().is_some_and(|trace| !trace.is_empty()));

        let handled = bridge.execute(Command::new("explode"));
        assert_eq!(handled, Response::error("nope"));

        let next = bridge.execute(Command::new("count"));
        assert_eq!(next, Response::success(json!(1)));

        shutdown.store(true, Ordering::SeqCst);
        host_thread.join().expect("join host");
    }
}
