//! One-shot hand-off of a response from the host thread to a waiting caller.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::{Duration, Instant};

use hostlink_wire::Response;
use thiserror::Error;

/// Why a wait ended without a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The bound elapsed before the host completed the command.
    #[error("command did not complete within {waited:?}")]
    TimedOut {
        /// How long the caller waited.
        waited: Duration,
    },
    /// The completion slot was dropped without being filled.
    #[error("command was dropped before it executed")]
    Abandoned,
}

/// Creates a linked waiter and completion slot for `command`.
pub(crate) fn pending(command: &str) -> (PendingExecution, CompletionSlot) {
    let (sender, receiver) = mpsc::sync_channel(1);
    (
        PendingExecution {
            command: command.to_owned(),
            created: Instant::now(),
            receiver,
        },
        CompletionSlot { sender },
    )
}

/// Caller side of an in-flight command.
#[derive(Debug)]
pub struct PendingExecution {
    command: String,
    created: Instant,
    receiver: Receiver<Response>,
}

impl PendingExecution {
    /// Command name awaiting execution.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Time since the command was handed to the host.
    pub fn elapsed(&self) -> Duration {
        self.created.elapsed()
    }

    /// Blocks until the slot is filled, the slot is dropped, or `timeout`
    /// elapses. Dropping the waiter abandons the slot.
    pub fn wait(self, timeout: Duration) -> Result<Response, WaitError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(response) => Ok(response),
            Err(RecvTimeoutError::Timeout) => Err(WaitError::TimedOut {
                waited: self.elapsed(),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(WaitError::Abandoned),
        }
    }
}

/// Host side of an in-flight command. Consumed by [`CompletionSlot::complete`],
/// so it can be filled at most once.
#[derive(Debug)]
pub struct CompletionSlot {
    sender: SyncSender<Response>,
}

impl CompletionSlot {
    /// Stores the terminal response.
    ///
    /// Returns `false` when the waiter has already given up; the response is
    /// discarded.
    pub fn complete(self, response: Response) -> bool {
        self.sender.try_send(response).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    #[test]
    fn waiter_receives_completed_response() {
        let (waiter, slot) = pending("get_scene_info");
        assert_eq!(waiter.command(), "get_scene_info");
        let writer = thread::spawn(move || slot.complete(Response::success(json!(1))));
        let response = waiter.wait(Duration::from_secs(5)).expect("response");
        assert_eq!(response, Response::success(json!(1)));
        assert!(writer.join().expect("join writer"));
    }

    #[test]
    fn wait_times_out_when_slot_is_never_filled() {
        let (waiter, _slot) = pending("stall");
        let error = waiter
            .wait(Duration::from_millis(20))
            .expect_err("should time out");
        assert!(matches!(error, WaitError::TimedOut { waited } if waited >= Duration::from_millis(20)));
    }

    #[test]
    fn completing_an_abandoned_slot_is_discarded() {
        let (waiter, slot) = pending("late");
        drop(waiter);
        assert!(!slot.complete(Response::success(json!(null))));
    }

    #[test]
    fn dropped_slot_reports_abandonment() {
        let (waiter, slot) = pending("dropped");
        drop(slot);
        assert_eq!(
            waiter.wait(Duration::from_secs(1)),
            Err(WaitError::Abandoned)
        );
    }
}
