use std::io::{BufRead, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, info, trace};

use super::dispatcher::{Dispatcher, EventSink};
use super::protocol::{read_message, write_message, DapMessage, DapMessageContent};
use crate::config::SessionIds;
use crate::debugger::{Gate, RunState};
use crate::error::{DapResult, TransportError};

const TRAFFIC: &str = "synthetic_dap::traffic";

struct OutboxState {
    seq: u64,
    writer: Box<dyn Write + Send>,
}

/// Serialized writer shared by the request loop and the debuggee thread.
pub struct Outbox {
    state: Mutex<OutboxState>,
    terminate: Arc<Gate>,
}

impl Outbox {
    fn new(writer: Box<dyn Write + Send>, terminate: Arc<Gate>) -> Self {
        Self {
            state: Mutex::new(OutboxState { seq: 0, writer }),
            terminate,
        }
    }

    /// Allocates the next `seq` and writes under the same lock, so sequence
    /// numbers follow write order.
    fn send(&self, content: DapMessageContent) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.seq += 1;
        let message = DapMessage {
            seq: state.seq,
            content,
        };
        trace!(target: TRAFFIC, ?message, "sending");
        write_message(&mut state.writer, &message)
    }

    pub fn send_response(
        &self,
        request_seq: u64,
        command: &str,
        result: DapResult<Option<Value>>,
    ) -> Result<(), TransportError> {
        let content = match result {
            Ok(body) => DapMessageContent::Response {
                request_seq,
                success: true,
                command: command.to_string(),
                message: None,
                body,
            },
            Err(err) => {
                debug!(command, %err, "request failed");
                DapMessageContent::Response {
                    request_seq,
                    success: false,
                    command: command.to_string(),
                    message: Some(err.to_string()),
                    body: None,
                }
            }
        };
        self.send(content)
    }
}

impl EventSink for Outbox {
    fn send_event(&self, event: &str, body: Option<Value>) {
        let content = DapMessageContent::Event {
            event: event.to_string(),
            body,
        };
        if let Err(err) = self.send(content) {
            error!(%err, event, "failed to write event; ending session");
            self.terminate.fire();
        }
    }
}

/// One debug session over a framed duplex stream.
pub struct DapServer {
    outbox: Arc<Outbox>,
    dispatcher: Dispatcher,
    terminate: Arc<Gate>,
}

impl DapServer {
    pub fn new(ids: SessionIds, writer: impl Write + Send + 'static) -> Self {
        let terminate = Arc::new(Gate::new());
        let outbox = Arc::new(Outbox::new(Box::new(writer), terminate.clone()));
        let dispatcher = Dispatcher::new(ids, outbox.clone(), terminate.clone());
        Self {
            outbox,
            dispatcher,
            terminate,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Runs the request loop on a dedicated thread.
    pub fn bind<R>(self: &Arc<Self>, reader: R) -> std::io::Result<JoinHandle<()>>
    where
        R: BufRead + Send + 'static,
    {
        let server = self.clone();
        thread::Builder::new()
            .name("dap-reader".to_string())
            .spawn(move || server.serve(reader))
    }

    /// Reads and dispatches requests until the stream ends or breaks. Either
    /// way the terminate gate is fired on return.
    pub fn serve<R: BufRead>(&self, mut reader: R) {
        let mut handled = 0u64;
        loop {
            match read_message(&mut reader) {
                Ok(Some(message)) => {
                    handled += 1;
                    trace!(target: TRAFFIC, ?message, "received");
                    if let Err(err) = self.dispatch(message) {
                        error!(%err, "failed to write response; ending session");
                        break;
                    }
                }
                Ok(None) => {
                    info!(handled, "client closed the stream");
                    break;
                }
                Err(err) => {
                    error!(%err, handled, "session error");
                    break;
                }
            }
        }
        self.terminate.fire();
    }

    fn dispatch(&self, message: DapMessage) -> Result<(), TransportError> {
        match message.content {
            DapMessageContent::Request { command, arguments } => {
                let result = self.dispatcher.handle(&command, arguments);
                let success = result.is_ok();
                self.outbox.send_response(message.seq, &command, result)?;
                self.dispatcher.response_sent(&command, success);
            }
            other => debug!(?other, "ignoring non-request message"),
        }
        Ok(())
    }

    pub fn wait_configured(&self) {
        self.dispatcher.wait_configured();
    }

    pub fn wait_terminate(&self) {
        self.dispatcher.wait_terminate();
    }

    /// Stops a still free-running debuggee once the client is configured.
    pub fn pause_if_running(&self) {
        if self.dispatcher.engine().state() == RunState::Running {
            self.dispatcher.pause();
        }
    }

    pub fn shutdown(&self) {
        self.dispatcher.engine().shutdown();
    }
}
