use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type DapResult<T> = Result<T, DapError>;

/// Request-level failures. These become `success: false` responses and never
/// end the session.
#[derive(Error, Debug)]
pub enum DapError {
    #[error("Unknown threadId '{0}'")]
    UnknownThread(i64),
    #[error("Unknown frameId '{0}'")]
    UnknownFrame(i64),
    #[error("Unknown variablesReference '{0}'")]
    UnknownVariablesReference(i64),
    #[error("Unknown source reference '{0}'")]
    UnknownSourceReference(i64),
    #[error("launch failed: {0}")]
    LaunchFailed(#[from] LaunchError),
    #[error("invalid arguments for '{command}': {source}")]
    InvalidArguments {
        command: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported command '{0}'")]
    UnsupportedCommand(String),
    #[error("cannot evaluate '{0}'")]
    CannotEvaluate(String),
}

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("cannot read program {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("debuggee already launched")]
    AlreadyLaunched,
    #[error("failed to spawn debuggee thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Failures of the framed stream itself. Any of these ends the session.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("message of {0} bytes exceeds the size limit")]
    TooLarge(usize),
}
