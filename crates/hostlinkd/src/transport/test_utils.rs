//! Connection handlers used by transport and server tests.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use hostlink_wire::{Response, write_frame};
use serde_json::json;

use super::{ConnectionHandler, ConnectionStream};

/// Greets every connection with `"accepted"` and reports it on a channel.
pub(crate) struct GreetingHandler {
    accepted: Mutex<Sender<()>>,
}

impl GreetingHandler {
    pub(crate) fn new() -> (Receiver<()>, Arc<Self>) {
        let (sender, receiver) = mpsc::channel();
        let handler = Arc::new(Self {
            accepted: Mutex::new(sender),
        });
        (receiver, handler)
    }
}

impl ConnectionHandler for GreetingHandler {
    fn handle(&self, mut stream: ConnectionStream) {
        if let Ok(sender) = self.accepted.lock() {
            sender.send(()).ok();
        }
        write_frame(&mut stream, &Response::success(json!("accepted"))).ok();
    }
}
