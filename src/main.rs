use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use synthetic_dap::config::AdapterConfig;
use synthetic_dap::{dap, logging};

#[derive(Parser, Debug)]
#[command(author, version, about = "Synthetic Debug Adapter Protocol server over stdio")]
struct Args {
    /// Write diagnostics to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log every DAP message (requests, responses, events).
    #[arg(long)]
    trace_dap: bool,

    /// Do not pause a free-running debuggee after configurationDone.
    #[arg(long)]
    no_pause: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AdapterConfig {
        log_file: args.log_file,
        trace_dap: args.trace_dap,
        pause_after_configuration: !args.no_pause,
        ..AdapterConfig::default()
    };

    logging::init(&config).context("initialize logging")?;
    info!(args = ?std::env::args().collect::<Vec<_>>(), "debug adapter started");

    dap::run_dap_mode(&config)?;

    info!("debug adapter exiting");
    Ok(())
}
