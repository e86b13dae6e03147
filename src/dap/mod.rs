mod dispatcher;
mod protocol;
mod requests;
mod server;

use std::io::{self, BufReader};
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use tracing::{debug, info};

use crate::config::AdapterConfig;

pub use dispatcher::{Dispatcher, EventRelay, EventSink};
pub use protocol::{read_message, write_message, DapMessage, DapMessageContent, MAX_MESSAGE_BYTES};
pub use requests::{LaunchArguments, SetBreakpointsArguments, SourceArgument, SourceBreakpoint};
pub use server::{DapServer, Outbox};

/// Serves one session over stdin/stdout and returns once the client asks
/// for termination or the stream goes away.
pub fn run_dap_mode(config: &AdapterConfig) -> anyhow::Result<()> {
    info!(ids = ?config.ids, "DAP server starting");

    let server = Arc::new(DapServer::new(config.ids, io::stdout()));
    // Left blocked on stdin at exit; the process ends underneath it.
    let _reader = server
        .bind(BufReader::new(io::stdin()))
        .context("spawn request reader")?;

    if config.pause_after_configuration {
        let operator = server.clone();
        thread::Builder::new()
            .name("configuration".to_string())
            .spawn(move || {
                operator.wait_configured();
                debug!("client configuration complete");
                operator.pause_if_running();
            })
            .context("spawn configuration waiter")?;
    }

    server.wait_terminate();
    info!("terminating session");
    server.shutdown();
    Ok(())
}
