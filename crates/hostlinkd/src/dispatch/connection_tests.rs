//! Tests for the connection state machine over scripted streams.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use hostlink_wire::{Params, Response};
use rstest::rstest;
use serde_json::{Value, json};

use super::connection::CommandConnection;
use super::{HandlerError, HandlerRegistry};
use crate::execution::ExecutionBridge;
use crate::host::HostLoop;

enum Step {
    Data(&'static [u8]),
    Interrupt,
    Pause(Duration),
    Fail,
}

struct ScriptedStream<'a> {
    steps: VecDeque<Step>,
    written: &'a mut Vec<u8>,
}

impl Read for ScriptedStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.steps.pop_front() {
            None => Ok(0),
            Some(Step::Data(bytes)) => {
                buf[..bytes.len()].copy_from_slice(bytes);
                Ok(bytes.len())
            }
            Some(Step::Interrupt) => Err(io::Error::from(io::ErrorKind::Interrupted)),
            Some(Step::Pause(quiet)) => {
                thread::sleep(quiet);
                Err(io::Error::from(io::ErrorKind::Interrupted))
            }
            Some(Step::Fail) => Err(io::Error::from(io::ErrorKind::ConnectionReset)),
        }
    }
}

impl Write for ScriptedStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn registry() -> Arc<HandlerRegistry<Vec<String>>> {
    Arc::new(
        HandlerRegistry::builder()
            .register("echo", |seen: &mut Vec<String>, params: &Params| {
                seen.push(String::from("echo"));
                Ok(Value::Object(params.clone()))
            })
            .register("refuse", |_seen: &mut Vec<String>, _params: &Params| {
                Err(HandlerError::new("refused"))
            })
            .build(),
    )
}

struct Served {
    answered: u64,
    responses: Vec<Response>,
    executed: Vec<String>,
}

fn serve(steps: Vec<Step>, max_frame_bytes: usize) -> Served {
    serve_with_host(steps, max_frame_bytes, Duration::from_secs(5), Duration::ZERO)
}

/// Serves `steps` while the host thread sleeps for `host_stall` before it
/// starts ticking.
fn serve_with_host(
    steps: Vec<Step>,
    max_frame_bytes: usize,
    timeout: Duration,
    host_stall: Duration,
) -> Served {
    let host = HostLoop::new(Vec::new());
    let bridge = ExecutionBridge::new(host.scheduler(), registry(), timeout);
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    let host_thread = thread::spawn(move || {
        thread::sleep(host_stall);
        let mut host = host;
        host.run_until(&flag, Duration::from_millis(1));
        host.into_state()
    });

    let mut written = Vec::new();
    let stream = ScriptedStream {
        steps: steps.into(),
        written: &mut written,
    };
    let answered = CommandConnection::new(stream, &bridge, max_frame_bytes, 1).serve();

    shutdown.store(true, Ordering::SeqCst);
    let executed = host_thread.join().expect("join host");
    let responses = String::from_utf8(written)
        .expect("utf8 output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("response frame"))
        .collect();
    Served {
        answered,
        responses,
        executed,
    }
}

const LIMIT: usize = 1024;

#[test]
fn answers_pipelined_frames_in_order() {
    let served = serve(
        vec![Step::Data(
            b"{\"type\":\"echo\",\"params\":{\"n\":1}}{\"type\":\"echo\",\"params\":{\"n\":2}}\n",
        )],
        LIMIT,
    );
    assert_eq!(served.answered, 2);
    assert_eq!(
        served.responses,
        vec![
            Response::success(json!({"n": 1})),
            Response::success(json!({"n": 2})),
        ]
    );
}

#[test]
fn reassembles_frames_split_across_reads() {
    let served = serve(
        vec![
            Step::Data(b"{\"type\":\"ec"),
            Step::Data(b"ho\",\"params\":{\"label\":\"caf\xc3"),
            Step::Data(b"\xa9\"}}"),
        ],
        LIMIT,
    );
    assert_eq!(served.responses, vec![Response::success(json!({"label": "café"}))]);
}

#[test]
fn reassembles_a_frame_split_at_every_byte() {
    const FRAME: &[u8] = b"{\"type\":\"echo\",\"params\":{\"label\":\"caf\xc3\xa9\"}}";
    for split in 1..FRAME.len() {
        let (head, tail) = FRAME.split_at(split);
        let served = serve(vec![Step::Data(head), Step::Data(tail)], LIMIT);
        assert_eq!(
            served.responses,
            vec![Response::success(json!({"label": "caf\u{e9}"}))],
            "split after byte {split}"
        );
    }
}

#[test]
fn connection_survives_a_command_timeout() {
    let served = serve_with_host(
        vec![
            Step::Data(b"{\"type\":\"echo\",\"params\":{\"n\":1}}"),
            Step::Pause(Duration::from_millis(400)),
            Step::Data(b"{\"type\":\"echo\",\"params\":{\"n\":2}}"),
        ],
        LIMIT,
        Duration::from_millis(100),
        Duration::from_millis(200),
    );
    assert_eq!(served.answered, 2);
    assert_eq!(
        served.responses,
        vec![
            Response::error("Command execution timeout"),
            Response::success(json!({"n": 2})),
        ]
    );
    // The timed-out command still ran once the host resumed.
    assert_eq!(served.executed, vec![String::from("echo"), String::from("echo")]);
}

#[rstest]
#[case::unknown(
    b"{\"type\":\"frobnicate\"}",
    Response::error("Unknown command: frobnicate")
)]
#[case::handler_error(b"{\"type\":\"refuse\"}", Response::error("refused"))]
fn recoverable_errors_keep_the_connection_open(
    #[case] first: &'static [u8],
    #[case] expected: Response,
) {
    let served = serve(
        vec![Step::Data(first), Step::Data(b"{\"type\":\"echo\"}")],
        LIMIT,
    );
    assert_eq!(
        served.responses,
        vec![expected, Response::success(json!({}))]
    );
    assert_eq!(served.executed, vec![String::from("echo")]);
}

#[test]
fn non_command_frames_are_answered_and_skipped() {
    let served = serve(
        vec![Step::Data(b"[1,2,3] {\"type\":\"echo\"}")],
        LIMIT,
    );
    assert_eq!(served.answered, 2);
    let message = served.responses[0].message().expect("error message");
    assert!(message.starts_with("Invalid command frame: "), "{message}");
    assert!(served.responses[1].is_success());
}

#[test]
fn malformed_input_gets_one_error_then_closes() {
    let served = serve(
        vec![
            Step::Data(b"{\"type\" oops}"),
            Step::Data(b"{\"type\":\"echo\"}"),
        ],
        LIMIT,
    );
    assert_eq!(served.answered, 1);
    assert!(!served.responses[0].is_success());
    assert!(served.executed.is_empty());
}

#[test]
fn oversized_input_gets_one_error_then_closes() {
    let served = serve(
        vec![
            Step::Data(b"{\"type\":\"echo\",\"params\":{\"padding\":\""),
            Step::Data(b"0123456789012345678901234567890123456789"),
        ],
        48,
    );
    assert_eq!(served.answered, 1);
    let message = served.responses[0].message().expect("error message");
    assert!(message.contains("exceeds 48 byte limit"), "{message}");
}

#[test]
fn interrupted_reads_are_retried() {
    let served = serve(
        vec![Step::Interrupt, Step::Data(b"{\"type\":\"echo\"}")],
        LIMIT,
    );
    assert_eq!(served.responses, vec![Response::success(json!({}))]);
}

#[test]
fn read_errors_close_quietly() {
    let served = serve(vec![Step::Fail, Step::Data(b"{\"type\":\"echo\"}")], LIMIT);
    assert_eq!(served.answered, 0);
    assert!(served.responses.is_empty());
}
