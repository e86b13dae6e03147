use std::path::Path;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use super::breakpoints::Breakpoints;
use super::events::{EngineEvent, EngineObserver, ObserverSlot};
use super::source::SourceDocument;
use super::stepping::RunState;
use crate::error::LaunchError;
use crate::executor;

/// Everything guarded by the engine's state lock.
pub(crate) struct ExecutionState {
    pub(crate) document: Arc<SourceDocument>,
    pub(crate) current_line: i64,
    pub(crate) breakpoints: Breakpoints,
    pub(crate) paused: bool,
    pub(crate) running: bool,
    pub(crate) terminated: bool,
    /// The worker has stopped walking and waits for the dispatch side.
    pub(crate) parked: bool,
    pub(crate) cancelled: bool,
    /// Free run is held back until the client has finished configuring.
    pub(crate) released: bool,
    /// Bumped on every step so a parked worker can tell it was released.
    pub(crate) steps: u64,
}

impl ExecutionState {
    pub(crate) fn total_lines(&self) -> i64 {
        self.document.line_count()
    }
}

pub(crate) struct Shared {
    pub(crate) state: Mutex<ExecutionState>,
    pub(crate) step_allowed: Condvar,
    pub(crate) observer: ObserverSlot,
}

/// The debugger core: cursor, breakpoints and the worker that walks the
/// synthetic program.
pub struct ExecutionEngine {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    source_reference: i64,
}

impl ExecutionEngine {
    pub fn new(source_reference: i64) -> Self {
        let state = ExecutionState {
            document: Arc::new(SourceDocument::synthetic(source_reference)),
            current_line: 1,
            breakpoints: Breakpoints::new(),
            paused: false,
            running: false,
            terminated: false,
            parked: false,
            cancelled: false,
            released: false,
            steps: 0,
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                step_allowed: Condvar::new(),
                observer: ObserverSlot::default(),
            }),
            worker: Mutex::new(None),
            source_reference,
        }
    }

    pub fn set_observer(&self, observer: Weak<dyn EngineObserver>) {
        self.shared.observer.set(observer);
    }

    /// Loads the program (or the built-in document when `program` is `None`),
    /// rewinds to line 1 and spawns the worker.
    pub fn launch(&self, program: Option<&Path>, stop_on_entry: bool) -> Result<(), LaunchError> {
        let document = match program {
            Some(path) => SourceDocument::load(path, self.source_reference)?,
            None => SourceDocument::synthetic(self.source_reference),
        };

        let mut worker = self.worker.lock();
        {
            let mut state = self.shared.state.lock();
            if state.running || state.terminated {
                return Err(LaunchError::AlreadyLaunched);
            }
            info!(
                program = %document.name(),
                lines = document.line_count(),
                stop_on_entry,
                "launching debuggee"
            );
            state.document = Arc::new(document);
            state.current_line = 1;
            state.paused |= stop_on_entry;
            // An entry stop holds the cursor on line 1 even if it is blank.
            state.parked = stop_on_entry;
            state.running = true;
        }

        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name("debuggee".to_string())
            .spawn(move || executor::run_worker(shared, stop_on_entry))
            .map_err(|err| {
                self.shared.state.lock().running = false;
                LaunchError::Spawn(err)
            })?;
        *worker = Some(handle);
        Ok(())
    }

    /// Resumes execution: scans forward (wrapping) for the next breakpoint
    /// and stops there. With no breakpoint in range the cursor stays put and
    /// nothing is reported.
    ///
    /// The scan runs to completion under the state lock, so the `Running`
    /// leg of the transition is never observable: the engine reads `Paused`
    /// both before and after.
    pub fn run(&self) {
        let hit = {
            let mut state = self.shared.state.lock();
            if !state.running || state.terminated || !state.paused {
                return;
            }
            let total = state.total_lines();
            let start = state.current_line;
            let found = (0..total)
                .map(|offset| ((start + offset) % total) + 1)
                .find(|line| state.breakpoints.contains(*line));
            match found {
                Some(line) => {
                    state.current_line = line;
                    state.paused = true;
                    debug!(line, "breakpoint reached");
                    true
                }
                None => {
                    debug!(line = start, "no breakpoint in range");
                    false
                }
            }
        };

        if hit {
            self.shared.observer.notify(EngineEvent::BreakpointHit);
        }
    }

    /// Lets a launched debuggee start free-running. Until then the worker
    /// holds on its first line. Calling it before `launch` releases the next
    /// launch immediately.
    pub fn release(&self) {
        let mut state = self.shared.state.lock();
        if !state.released {
            debug!("debuggee released");
            state.released = true;
            self.shared.step_allowed.notify_all();
        }
    }

    /// Requests a stop. The worker halts at its next non-blank line.
    pub fn pause(&self) {
        self.shared.state.lock().paused = true;
        self.shared.observer.notify(EngineEvent::Paused);
    }

    /// Moves the cursor one line forward, wrapping after the last line.
    pub fn step_forward(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.terminated {
                return;
            }
            let total = state.total_lines();
            state.current_line = (state.current_line % total) + 1;
            state.steps = state.steps.wrapping_add(1);
            debug!(line = state.current_line, "stepped");
            self.shared.step_allowed.notify_all();
        }
        self.shared.observer.notify(EngineEvent::Stepped);
    }

    pub fn add_breakpoint(&self, line: i64) {
        self.shared.state.lock().breakpoints.add(line);
    }

    pub fn clear_breakpoints(&self) {
        self.shared.state.lock().breakpoints.clear();
    }

    pub fn current_line(&self) -> i64 {
        self.shared.state.lock().current_line
    }

    pub fn state(&self) -> RunState {
        let state = self.shared.state.lock();
        RunState::from_flags(state.running, state.paused, state.terminated)
    }

    pub fn document(&self) -> Arc<SourceDocument> {
        self.shared.state.lock().document.clone()
    }

    pub fn line_count(&self) -> i64 {
        self.shared.state.lock().total_lines()
    }

    /// Cancels the worker and waits for it to exit.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.cancelled = true;
            self.shared.step_allowed.notify_all();
        }

        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            warn!("debuggee thread panicked");
        } else {
            debug!("debuggee thread joined");
        }
    }
}

impl Drop for ExecutionEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
