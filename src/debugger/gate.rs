use parking_lot::{Condvar, Mutex};

/// One-shot wait/signal latch.
///
/// Once fired it stays fired: every current and future `wait()` returns.
#[derive(Default)]
pub struct Gate {
    fired: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the gate has been fired.
    pub fn wait(&self) {
        let mut fired = self.fired.lock();
        while !*fired {
            self.cv.wait(&mut fired);
        }
    }

    /// Fires the gate and releases all waiters. Repeated calls are no-ops.
    pub fn fire(&self) {
        let mut fired = self.fired.lock();
        *fired = true;
        self.cv.notify_all();
    }

    pub fn is_fired(&self) -> bool {
        *self.fired.lock()
    }
}
