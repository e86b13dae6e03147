use std::sync::Arc;

use parking_lot::MutexGuard;
use tracing::{debug, info};

use crate::debugger::{EngineEvent, Shared};

/// Body of the debuggee thread spawned by `launch`.
///
/// Nothing moves before the engine is released. While free-running it walks
/// the document forward, stopping at breakpoints on non-blank lines. Once
/// paused it parks until a step, a resume or cancellation wakes it, and
/// leaves the cursor to the dispatch side.
pub(crate) fn run_worker(shared: Arc<Shared>, stop_on_entry: bool) {
    debug!("debuggee thread started");
    shared.observer.notify(EngineEvent::ThreadStarted);
    if stop_on_entry {
        shared.observer.notify(EngineEvent::Paused);
    }

    let mut state = shared.state.lock();
    'run: loop {
        if state.cancelled {
            debug!(line = state.current_line, "debuggee cancelled");
            break 'run;
        }

        let line = state.current_line;
        let blank = state.document.is_blank(line);

        // Pause only takes hold on a line with something on it.
        if state.paused && (state.parked || !blank) {
            if !state.parked {
                debug!(line, "debuggee parked");
                state.parked = true;
            }
            let seen = state.steps;
            shared
                .step_allowed
                .wait_while(&mut state, |s| s.steps == seen && s.paused && !s.cancelled);
            continue 'run;
        }

        if !state.released {
            debug!("debuggee waiting for configuration");
            shared
                .step_allowed
                .wait_while(&mut state, |s| !s.released && !s.cancelled);
            continue 'run;
        }

        if !blank && state.breakpoints.contains(line) {
            info!(line, "breakpoint hit");
            state.paused = true;
            state.parked = true;
            MutexGuard::unlocked(&mut state, || {
                shared.observer.notify(EngineEvent::BreakpointHit)
            });
            continue 'run;
        }

        if line >= state.total_lines() {
            state.running = false;
            state.terminated = true;
            drop(state);
            info!("debuggee ran to completion");
            shared.observer.notify(EngineEvent::Terminated);
            shared.observer.notify(EngineEvent::Exited);
            return;
        }

        state.current_line += 1;
        MutexGuard::bump(&mut state);
    }
}
