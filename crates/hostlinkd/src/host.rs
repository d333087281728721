//! Cooperative single-threaded host loop.
//!
//! The host owns state that must only be touched from one thread. Other
//! threads hand it work through a [`HostScheduler`]; the owning thread drains
//! that queue one task per tick, so tasks never overlap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

pub(crate) const HOST_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::host");

/// Unit of work executed on the host thread.
pub type HostTask<H> = Box<dyn FnOnce(&mut H) + Send + 'static>;

/// Returned when a task is scheduled after the host loop has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("host tick loop is not running")]
pub struct HostStopped;

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No task was waiting.
    Idle,
    /// Exactly one task ran.
    Ran,
}

/// Owns the host state and drains scheduled tasks.
pub struct HostLoop<H> {
    state: H,
    sender: Sender<HostTask<H>>,
    receiver: Receiver<HostTask<H>>,
}

impl<H> HostLoop<H> {
    /// Wraps `state` in a loop with an empty task queue.
    pub fn new(state: H) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            state,
            sender,
            receiver,
        }
    }

    /// Returns a handle other threads use to enqueue tasks.
    #[must_use]
    pub fn scheduler(&self) -> HostScheduler<H> {
        HostScheduler {
            sender: self.sender.clone(),
        }
    }

    /// Runs at most one queued task without blocking.
    pub fn tick(&mut self) -> TickOutcome {
        match self.receiver.try_recv() {
            Ok(task) => self.run(task),
            Err(_) => TickOutcome::Idle,
        }
    }

    /// Waits up to `wait` for a task and runs it.
    pub fn tick_timeout(&mut self, wait: Duration) -> TickOutcome {
        match self.receiver.recv_timeout(wait) {
            Ok(task) => self.run(task),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => TickOutcome::Idle,
        }
    }

    /// Ticks until `shutdown` is set, waiting at most `idle_wait` per tick.
    ///
    /// Returns the number of tasks executed.
    pub fn run_until(&mut self, shutdown: &AtomicBool, idle_wait: Duration) -> u64 {
        info!(target: HOST_TARGET, "host tick loop running");
        let mut executed = 0_u64;
        while !shutdown.load(Ordering::SeqCst) {
            if self.tick_timeout(idle_wait) == TickOutcome::Ran {
                executed += 1;
            }
        }
        info!(target: HOST_TARGET, executed, "host tick loop stopped");
        executed
    }

    /// Shared access to the host state.
    pub const fn state(&self) -> &H {
        &self.state
    }

    /// Exclusive access to the host state.
    pub const fn state_mut(&mut self) -> &mut H {
        &mut self.state
    }

    /// Consumes the loop, dropping any queued tasks.
    pub fn into_state(self) -> H {
        self.state
    }

    fn run(&mut self, task: HostTask<H>) -> TickOutcome {
        debug!(target: HOST_TARGET, "running scheduled task");
        task(&mut self.state);
        TickOutcome::Ran
    }
}

/// Thread-safe handle for enqueuing tasks on a [`HostLoop`].
pub struct HostScheduler<H> {
    sender: Sender<HostTask<H>>,
}

impl<H> Clone for HostScheduler<H> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<H> std::fmt::Debug for HostScheduler<H> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("HostScheduler").finish_non_exhaustive()
    }
}

impl<H> HostScheduler<H> {
    /// Queues `task` to run on the host thread at a later tick.
    ///
    /// # Errors
    ///
    /// Returns [`HostStopped`] when the owning loop has been dropped.
    pub fn schedule<F>(&self, task: F) -> Result<(), HostStopped>
    where
        F: FnOnce(&mut H) + Send + 'static,
    {
        self.sender.send(Box::new(task)).map_err(|_| HostStopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn tick_runs_one_task_at_a_time() {
        let mut host = HostLoop::new(Vec::<u32>::new());
        let scheduler = host.scheduler();
        for value in 1..=3 {
            scheduler
                .schedule(move |state: &mut Vec<u32>| state.push(value))
                .expect("schedule");
        }

        assert_eq!(host.tick(), TickOutcome::Ran);
        assert_eq!(host.state(), &vec![1]);
        assert_eq!(host.tick(), TickOutcome::Ran);
        assert_eq!(host.tick(), TickOutcome::Ran);
        assert_eq!(host.tick(), TickOutcome::Idle);
        assert_eq!(host.into_state(), vec![1, 2, 3]);
    }

    #[test]
    fn tick_timeout_returns_idle_when_nothing_arrives() {
        let mut host = HostLoop::new(0_u8);
        assert_eq!(
            host.tick_timeout(Duration::from_millis(5)),
            TickOutcome::Idle
        );
    }

    #[test]
    fn scheduling_fails_once_loop_is_dropped() {
        let host = HostLoop::new(());
        let scheduler = host.scheduler();
        drop(host);
        assert_eq!(scheduler.schedule(|(): &mut ()| {}), Err(HostStopped));
    }

    #[test]
    fn run_until_stops_when_flag_is_set() {
        let mut host = HostLoop::new(0_u32);
        let scheduler = host.scheduler();
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        scheduler
            .schedule(move |count: &mut u32| {
                *count += 1;
                flag.store(true, Ordering::SeqCst);
            })
            .expect("schedule");

        let executed = host.run_until(&shutdown, Duration::from_millis(5));
        assert_eq!(executed, 1);
        assert_eq!(*host.state(), 1);
    }
}
