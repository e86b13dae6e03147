use std::path::PathBuf;

/// Identifiers handed to the client for the one thread, frame, scope and
/// source. They carry no meaning and only need to stay constant for the
/// duration of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionIds {
    pub thread_id: i64,
    pub frame_id: i64,
    pub variables_reference: i64,
    pub source_reference: i64,
}

impl Default for SessionIds {
    fn default() -> Self {
        Self {
            thread_id: 100,
            frame_id: 200,
            variables_reference: 300,
            source_reference: 400,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub ids: SessionIds,
    /// Diagnostics go here instead of stderr when set.
    pub log_file: Option<PathBuf>,
    /// Log every framed message at trace level.
    pub trace_dap: bool,
    /// Stop a free-running debuggee once the client finishes configuration.
    pub pause_after_configuration: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            ids: SessionIds::default(),
            log_file: None,
            trace_dap: false,
            pause_after_configuration: true,
        }
    }
}
