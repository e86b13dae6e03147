use std::io::{BufReader, Cursor, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use synthetic_dap::config::SessionIds;
use synthetic_dap::dap::{read_message, write_message, DapMessage, DapMessageContent, DapServer};
use synthetic_dap::debugger::RunState;

/// Writer handle whose bytes stay readable after the server takes ownership.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// Frames a sequence of requests the way a client would send them
fn client_script(requests: &[(&str, Option<Value>)]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (index, (command, arguments)) in requests.iter().enumerate() {
        let message = DapMessage::request(index as u64 + 1, *command, arguments.clone());
        write_message(&mut bytes, &message).expect("Failed to frame request");
    }
    bytes
}

/// Writer standing in for a client that has gone away.
struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "client gone"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Reader that must never be reached.
struct NoMoreInput;

impl Read for NoMoreInput {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        panic!("server kept reading after a failed write");
    }
}

/// Runs a whole session to EOF and returns everything the server wrote.
fn run_session(requests: &[(&str, Option<Value>)]) -> Vec<DapMessage> {
    let output = SharedBuffer::default();
    let server = DapServer::new(SessionIds::default(), output.clone());
    server.serve(BufReader::new(Cursor::new(client_script(requests))));
    server.wait_terminate();
    server.shutdown();

    let bytes = output.0.lock().unwrap().clone();
    let mut reader = BufReader::new(Cursor::new(bytes));
    let mut messages = Vec::new();
    while let Some(message) = read_message(&mut reader).expect("Server wrote a malformed frame") {
        messages.push(message);
    }
    messages
}

/// The response to the request with `request_seq`, as (success, message, body).
fn response_to(
    messages: &[DapMessage],
    seq: u64,
) -> (bool, Option<String>, Option<Value>) {
    messages
        .iter()
        .find_map(|message| match &message.content {
            DapMessageContent::Response {
                request_seq,
                success,
                message,
                body,
                ..
            } if *request_seq == seq => Some((*success, message.clone(), body.clone())),
            _ => None,
        })
        .unwrap_or_else(|| panic!("No response to request {}", seq))
}

fn events_named<'a>(messages: &'a [DapMessage], name: &str) -> Vec<(usize, Option<&'a Value>)> {
    messages
        .iter()
        .enumerate()
        .filter_map(|(index, message)| match &message.content {
            DapMessageContent::Event { event, body } if event == name => Some((index, body.as_ref())),
            _ => None,
        })
        .collect()
}

fn position_of_response(messages: &[DapMessage], seq: u64) -> usize {
    messages
        .iter()
        .position(|message| {
            matches!(&message.content, DapMessageContent::Response { request_seq, .. } if *request_seq == seq)
        })
        .unwrap_or_else(|| panic!("No response to request {}", seq))
}

#[test]
fn test_handshake_sends_initialized_after_response() {
    let messages = run_session(&[
        ("initialize", Some(json!({"adapterID": "synthetic"}))),
        ("configurationDone", None),
    ]);

    let (success, _, body) = response_to(&messages, 1);
    assert!(success);
    assert_eq!(body.unwrap()["supportsConfigurationDoneRequest"], true);

    let initialized = events_named(&messages, "initialized");
    assert_eq!(initialized.len(), 1);
    assert!(initialized[0].0 > position_of_response(&messages, 1));

    let (success, _, _) = response_to(&messages, 2);
    assert!(success);
}

#[test]
fn test_outgoing_sequence_numbers_increase() {
    let messages = run_session(&[
        ("initialize", None),
        ("launch", Some(json!({"stopOnEntry": true}))),
        ("threads", None),
        ("next", None),
    ]);

    assert!(messages.len() >= 5);
    for pair in messages.windows(2) {
        assert_eq!(pair[1].seq, pair[0].seq + 1, "Sequence numbers must be gapless");
    }
}

#[test]
fn test_full_debug_session() {
    let messages = run_session(&[
        ("initialize", None),
        ("launch", Some(json!({"stopOnEntry": true}))),
        (
            "setBreakpoints",
            Some(json!({
                "source": {"name": "HelloDebuggerSource", "sourceReference": 400},
                "breakpoints": [{"line": 3}, {"line": 10}]
            })),
        ),
        ("configurationDone", None),
        ("threads", None),
        ("stackTrace", Some(json!({"threadId": 100}))),
        ("next", None),
        ("variables", Some(json!({"variablesReference": 300}))),
        ("continue", Some(json!({"threadId": 100}))),
        ("variables", Some(json!({"variablesReference": 301}))),
        ("stackTrace", Some(json!({"threadId": 100}))),
        ("disconnect", Some(json!({"terminateDebuggee": true}))),
    ]);

    let (success, _, _) = response_to(&messages, 2);
    assert!(success, "Launch should be acknowledged");

    let (_, _, body) = response_to(&messages, 3);
    let verified: Vec<bool> = body.unwrap()["breakpoints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|bp| bp["verified"].as_bool().unwrap())
        .collect();
    assert_eq!(verified, vec![true, false]);

    let (_, _, body) = response_to(&messages, 5);
    assert_eq!(body.unwrap()["threads"][0]["id"], 100);

    let (_, _, body) = response_to(&messages, 6);
    assert_eq!(body.unwrap()["stackFrames"][0]["line"], 1);

    let (_, _, body) = response_to(&messages, 8);
    assert_eq!(body.unwrap()["variables"][0]["value"], "2");

    let (success, message, _) = response_to(&messages, 10);
    assert!(!success);
    assert!(message.unwrap().contains("301"));

    let (_, _, body) = response_to(&messages, 11);
    assert_eq!(body.unwrap()["stackFrames"][0]["line"], 3, "Continue should stop at line 3");

    let reasons: Vec<&str> = events_named(&messages, "stopped")
        .into_iter()
        .filter_map(|(_, body)| body.and_then(|body| body["reason"].as_str()))
        .collect();
    assert!(reasons.contains(&"step"));
    assert!(reasons.contains(&"breakpoint"));

    let (success, _, _) = response_to(&messages, 12);
    assert!(success);
}

#[test]
fn test_launch_of_missing_program_fails_request_only() {
    let messages = run_session(&[
        ("initialize", None),
        ("launch", Some(json!({"program": "/definitely/not/here.bas"}))),
        ("threads", None),
    ]);

    let (success, message, _) = response_to(&messages, 2);
    assert!(!success);
    assert!(message.unwrap().starts_with("launch failed"));

    let (success, _, _) = response_to(&messages, 3);
    assert!(success, "The session keeps serving after a failed launch");
}

#[test]
fn test_unknown_command_gets_error_response() {
    let messages = run_session(&[("initialize", None), ("restartFrame", None), ("threads", None)]);

    let (success, message, _) = response_to(&messages, 2);
    assert!(!success);
    assert!(message.unwrap().contains("restartFrame"));
    assert!(response_to(&messages, 3).0);
}

#[test]
fn test_free_running_program_reports_exit() {
    let mut program = tempfile::NamedTempFile::new().unwrap();
    writeln!(program, "PRINT \"one\"\nPRINT \"two\"\nEND").unwrap();
    program.flush().unwrap();

    let output = SharedBuffer::default();
    let server = DapServer::new(SessionIds::default(), output.clone());
    let requests = client_script(&[
        ("initialize", None),
        ("launch", Some(json!({"program": program.path()}))),
        ("configurationDone", None),
    ]);
    server.serve(BufReader::new(Cursor::new(requests)));

    let deadline = Instant::now() + Duration::from_secs(5);
    while server.dispatcher().engine().state() != RunState::Terminated {
        assert!(Instant::now() < deadline, "Program never ran to completion");
        std::thread::sleep(Duration::from_millis(5));
    }
    server.shutdown();

    let bytes = output.0.lock().unwrap().clone();
    let mut reader = BufReader::new(Cursor::new(bytes));
    let mut events = Vec::new();
    while let Some(message) = read_message(&mut reader).unwrap() {
        if let DapMessageContent::Event { event, body } = message.content {
            events.push((event, body));
        }
    }
    let names: Vec<&str> = events.iter().map(|(event, _)| event.as_str()).collect();
    assert_eq!(names.first(), Some(&"output"));
    assert!(names.contains(&"thread"));
    assert!(!names.contains(&"stopped"), "No breakpoints, so no stop");

    let terminated = names.iter().position(|name| *name == "terminated").unwrap();
    let exited = names.iter().position(|name| *name == "exited").unwrap();
    assert!(terminated < exited);
    assert_eq!(events[exited].1.as_ref().unwrap()["exitCode"], 0);
}

#[test]
fn test_malformed_input_ends_session() {
    let output = SharedBuffer::default();
    let server = DapServer::new(SessionIds::default(), output.clone());
    server.serve(BufReader::new(Cursor::new(b"Content-Type: text\r\n\r\n{}".to_vec())));

    server.wait_terminate();
    assert!(server.dispatcher().is_terminate_requested());
    assert!(output.0.lock().unwrap().is_empty());
}

#[test]
fn test_non_request_messages_are_ignored() {
    let mut bytes = Vec::new();
    let event = DapMessage {
        seq: 1,
        content: DapMessageContent::Event {
            event: "custom".to_string(),
            body: None,
        },
    };
    write_message(&mut bytes, &event).unwrap();
    bytes.extend(client_script(&[("initialize", None)]));

    let output = SharedBuffer::default();
    let server = DapServer::new(SessionIds::default(), output.clone());
    server.serve(BufReader::new(Cursor::new(bytes)));

    let written = output.0.lock().unwrap().clone();
    let mut reader = BufReader::new(Cursor::new(written));
    let first = read_message(&mut reader).unwrap().unwrap();
    assert!(matches!(first.content, DapMessageContent::Response { success: true, .. }));
}

#[test]
fn test_breakpoints_from_configuration_phase_stop_free_run() {
    let mut program = tempfile::NamedTempFile::new().unwrap();
    for i in 1..=7 {
        writeln!(program, "PRINT {}", i).unwrap();
    }
    program.flush().unwrap();

    let output = SharedBuffer::default();
    let server = DapServer::new(SessionIds::default(), output.clone());
    server.serve(BufReader::new(Cursor::new(client_script(&[
        ("initialize", None),
        ("launch", Some(json!({"program": program.path()}))),
    ]))));

    // The client is slow to configure; the debuggee must not run ahead.
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(server.dispatcher().engine().current_line(), 1);

    server.serve(BufReader::new(Cursor::new(client_script(&[
        (
            "setBreakpoints",
            Some(json!({"source": {"path": program.path()}, "breakpoints": [{"line": 3}]})),
        ),
        ("configurationDone", None),
    ]))));

    let deadline = Instant::now() + Duration::from_secs(5);
    while server.dispatcher().engine().state() != RunState::Paused {
        assert!(Instant::now() < deadline, "Debuggee never stopped");
        std::thread::sleep(Duration::from_millis(5));
    }
    server.shutdown();

    let bytes = output.0.lock().unwrap().clone();
    let mut reader = BufReader::new(Cursor::new(bytes));
    let mut messages = Vec::new();
    while let Some(message) = read_message(&mut reader).unwrap() {
        messages.push(message);
    }

    let reasons: Vec<&str> = events_named(&messages, "stopped")
        .into_iter()
        .filter_map(|(_, body)| body.and_then(|body| body["reason"].as_str()))
        .collect();
    assert_eq!(reasons, vec!["breakpoint"]);
    assert!(events_named(&messages, "terminated").is_empty());
    assert_eq!(server.dispatcher().engine().current_line(), 3);
}

#[test]
fn test_response_write_failure_ends_session() {
    let server = DapServer::new(SessionIds::default(), BrokenPipe);
    let script = client_script(&[("initialize", None)]);

    // Anything read after the failed write would come from `NoMoreInput`.
    server.serve(BufReader::new(Cursor::new(script).chain(NoMoreInput)));

    server.wait_terminate();
    assert!(server.dispatcher().is_terminate_requested());
}

#[test]
fn test_event_write_failure_ends_session() {
    let server = DapServer::new(SessionIds::default(), BrokenPipe);
    assert!(!server.dispatcher().is_terminate_requested());

    server.dispatcher().engine().pause();

    server.wait_terminate();
    assert!(server.dispatcher().is_terminate_requested());
}
