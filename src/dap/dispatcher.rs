use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::requests::{
    self, DisconnectArguments, EvaluateArguments, LaunchArguments, ScopesArguments,
    SetBreakpointsArguments, SourceArguments, StackTraceArguments, VariablesArguments,
};
use crate::config::SessionIds;
use crate::debugger::{EngineEvent, EngineObserver, ExecutionEngine, Gate, RunState, SourceDocument};
use crate::error::{DapError, DapResult};

/// Outbound half of the session boundary. Implementations must serialize
/// concurrent sends.
pub trait EventSink: Send + Sync {
    fn send_event(&self, event: &str, body: Option<Value>);
}

/// Turns engine notifications into protocol events.
pub struct EventRelay {
    thread_id: i64,
    sink: Arc<dyn EventSink>,
}

impl EventRelay {
    fn stopped(&self, reason: &str) {
        self.sink.send_event(
            "stopped",
            Some(json!({
                "reason": reason,
                "threadId": self.thread_id,
                "allThreadsStopped": true
            })),
        );
    }
}

impl EngineObserver for EventRelay {
    fn on_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::Stepped => self.stopped("step"),
            EngineEvent::BreakpointHit => self.stopped("breakpoint"),
            EngineEvent::Paused => self.stopped("pause"),
            EngineEvent::ThreadStarted => self.sink.send_event(
                "thread",
                Some(json!({
                    "reason": "started",
                    "threadId": self.thread_id
                })),
            ),
            EngineEvent::Terminated => self.sink.send_event("terminated", None),
            EngineEvent::Exited => self.sink.send_event("exited", Some(json!({"exitCode": 0}))),
        }
    }
}

/// Maps each request verb onto the engine and builds the response body.
pub struct Dispatcher {
    ids: SessionIds,
    engine: ExecutionEngine,
    // Keeps the engine's weak observer link alive.
    relay: Arc<EventRelay>,
    configured: Gate,
    terminate: Arc<Gate>,
}

impl Dispatcher {
    pub fn new(ids: SessionIds, sink: Arc<dyn EventSink>, terminate: Arc<Gate>) -> Self {
        let engine = ExecutionEngine::new(ids.source_reference);
        let relay = Arc::new(EventRelay {
            thread_id: ids.thread_id,
            sink,
        });
        let observer: Arc<dyn EngineObserver> = relay.clone();
        engine.set_observer(Arc::downgrade(&observer));

        Self {
            ids,
            engine,
            relay,
            configured: Gate::new(),
            terminate,
        }
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    pub fn wait_configured(&self) {
        self.configured.wait();
    }

    pub fn wait_terminate(&self) {
        self.terminate.wait();
    }

    pub fn is_terminate_requested(&self) -> bool {
        self.terminate.is_fired()
    }

    /// Stops the debuggee; used by the operator once configuration is done.
    pub fn pause(&self) {
        self.engine.pause();
    }

    pub fn handle(&self, command: &str, arguments: Option<Value>) -> DapResult<Option<Value>> {
        debug!(command, "dispatching request");
        match command {
            "initialize" => Ok(Some(self.capabilities())),
            "launch" => self.launch(requests::parse(command, arguments)?),
            "setBreakpoints" => self.set_breakpoints(requests::parse(command, arguments)?),
            "setExceptionBreakpoints" => Ok(None),
            "configurationDone" => {
                self.engine.release();
                self.configured.fire();
                Ok(None)
            }
            "threads" => Ok(Some(self.threads())),
            "stackTrace" => self.stack_trace(requests::parse(command, arguments)?),
            "scopes" => self.scopes(requests::parse(command, arguments)?),
            "variables" => self.variables(requests::parse(command, arguments)?),
            "source" => self.source(requests::parse(command, arguments)?),
            "evaluate" => self.evaluate(requests::parse(command, arguments)?),
            "pause" => {
                self.engine.pause();
                Ok(None)
            }
            // Resuming is a bounded scan; the thread is stopped again when the
            // response goes out.
            "continue" => {
                self.engine.run();
                Ok(Some(json!({"allThreadsContinued": true})))
            }
            // Only one frame exists, so step-in is a plain step.
            "next" | "stepIn" => {
                self.engine.step_forward();
                Ok(None)
            }
            "stepOut" => Ok(None),
            "disconnect" => self.disconnect(requests::parse(command, arguments)?),
            other => Err(DapError::UnsupportedCommand(other.to_string())),
        }
    }

    /// Runs after a response has been written to the client.
    pub fn response_sent(&self, command: &str, success: bool) {
        if command == "initialize" && success {
            self.relay.sink.send_event("initialized", None);
        }
    }

    fn capabilities(&self) -> Value {
        json!({
            "supportsConfigurationDoneRequest": true,
            "supportsStepBack": false,
            "supportsFunctionBreakpoints": false,
            "supportsConditionalBreakpoints": false,
            "supportsSetVariable": false,
            "supportsEvaluateForHovers": false,
            "supportsTerminateRequest": false,
        })
    }

    fn launch(&self, args: LaunchArguments) -> DapResult<Option<Value>> {
        let program = args.program.as_deref();
        match program {
            Some(path) => self.output(format!("Launching {}\n", path.display())),
            None => self.output("Launching the synthetic program\n".to_string()),
        }
        self.engine.launch(program, args.stop_on_entry)?;
        Ok(None)
    }

    fn set_breakpoints(&self, args: SetBreakpointsArguments) -> DapResult<Option<Value>> {
        let document = self.engine.document();
        let lines = args.requested_lines();

        if !self.targets_document(&args, &document)? {
            debug!(path = ?args.source.path, "breakpoints for an unknown source left unverified");
            let breakpoints: Vec<Value> = lines
                .iter()
                .map(|line| json!({"verified": false, "line": line}))
                .collect();
            return Ok(Some(json!({ "breakpoints": breakpoints })));
        }

        let total = document.line_count();
        self.engine.clear_breakpoints();
        let breakpoints: Vec<Value> = lines
            .iter()
            .map(|&line| {
                self.engine.add_breakpoint(line);
                json!({
                    "verified": line < total,
                    "line": line,
                    "source": self.source_descriptor(&document),
                })
            })
            .collect();
        Ok(Some(json!({ "breakpoints": breakpoints })))
    }

    /// A source addresses the loaded document by our reference id, or by
    /// path when no reference is given.
    fn targets_document(
        &self,
        args: &SetBreakpointsArguments,
        document: &SourceDocument,
    ) -> DapResult<bool> {
        match args.source.source_reference {
            Some(reference) if reference > 0 => {
                if reference == self.ids.source_reference {
                    Ok(true)
                } else {
                    Err(DapError::UnknownSourceReference(reference))
                }
            }
            _ => Ok(match (args.source.path.as_deref(), document.path()) {
                (Some(requested), Some(loaded)) => same_file(requested, loaded),
                _ => false,
            }),
        }
    }

    fn threads(&self) -> Value {
        json!({
            "threads": [
                {
                    "id": self.ids.thread_id,
                    "name": "Debuggee"
                }
            ]
        })
    }

    fn stack_trace(&self, args: StackTraceArguments) -> DapResult<Option<Value>> {
        if args.thread_id != self.ids.thread_id {
            return Err(DapError::UnknownThread(args.thread_id));
        }

        let document = self.engine.document();
        let line = self.engine.current_line();
        Ok(Some(json!({
            "stackFrames": [
                {
                    "id": self.ids.frame_id,
                    "name": "main",
                    "line": line,
                    "column": 1,
                    "source": self.source_descriptor(&document),
                }
            ],
            "totalFrames": 1
        })))
    }

    fn scopes(&self, args: ScopesArguments) -> DapResult<Option<Value>> {
        if args.frame_id != self.ids.frame_id {
            return Err(DapError::UnknownFrame(args.frame_id));
        }
        Ok(Some(json!({
            "scopes": [
                {
                    "name": "Locals",
                    "presentationHint": "locals",
                    "variablesReference": self.ids.variables_reference,
                    "expensive": false
                }
            ]
        })))
    }

    fn variables(&self, args: VariablesArguments) -> DapResult<Option<Value>> {
        if args.variables_reference != self.ids.variables_reference {
            return Err(DapError::UnknownVariablesReference(args.variables_reference));
        }
        Ok(Some(json!({
            "variables": [
                {
                    "name": "currentLine",
                    "value": self.engine.current_line().to_string(),
                    "type": "int",
                    "variablesReference": 0
                }
            ]
        })))
    }

    fn source(&self, args: SourceArguments) -> DapResult<Option<Value>> {
        let reference = args.reference();
        if reference != self.ids.source_reference {
            return Err(DapError::UnknownSourceReference(reference));
        }
        let document = self.engine.document();
        Ok(Some(json!({
            "content": document.content(),
            "mimeType": "text/plain"
        })))
    }

    fn evaluate(&self, args: EvaluateArguments) -> DapResult<Option<Value>> {
        if let Some(frame_id) = args.frame_id {
            if frame_id != self.ids.frame_id {
                return Err(DapError::UnknownFrame(frame_id));
            }
        }
        match args.expression.trim() {
            "currentLine" => Ok(Some(json!({
                "result": self.engine.current_line().to_string(),
                "type": "int",
                "variablesReference": 0
            }))),
            other => Err(DapError::CannotEvaluate(other.to_string())),
        }
    }

    fn disconnect(&self, args: DisconnectArguments) -> DapResult<Option<Value>> {
        if args.terminate_debuggee.unwrap_or(false) {
            info!("client requested termination");
            self.terminate.fire();
        } else if self.engine.state() != RunState::Terminated {
            warn!("client disconnected without terminating the debuggee");
        }
        Ok(None)
    }

    fn output(&self, text: String) {
        self.relay.sink.send_event(
            "output",
            Some(json!({
                "category": "console",
                "output": text
            })),
        );
    }

    fn source_descriptor(&self, document: &SourceDocument) -> Value {
        let mut source = json!({
            "name": document.name(),
            "sourceReference": self.ids.source_reference,
        });
        if let Some(path) = document.path() {
            source["path"] = Value::String(path.display().to_string());
        }
        source
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
