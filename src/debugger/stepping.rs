/// Lifecycle of the debuggee.
///
/// `Running` is only seen while the worker free-runs (after a launch without
/// an entry stop). Once paused, the debuggee stays `Paused`: stepping and
/// resuming move the cursor synchronously and leave it stopped, so `Running`
/// returns only with a new launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Not launched yet.
    Idle,
    Running,
    Paused,
    /// Program exhausted; state is frozen.
    Terminated,
}

impl RunState {
    pub(crate) fn from_flags(running: bool, paused: bool, terminated: bool) -> Self {
        match (terminated, running, paused) {
            (true, _, _) => RunState::Terminated,
            (false, false, _) => RunState::Idle,
            (false, true, true) => RunState::Paused,
            (false, true, false) => RunState::Running,
        }
    }
}
