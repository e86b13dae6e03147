use std::sync::Weak;

use parking_lot::Mutex;
use tracing::trace;

/// Notifications raised by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    BreakpointHit,
    Stepped,
    Paused,
    ThreadStarted,
    Terminated,
    Exited,
}

/// The single subscriber of an engine's notifications.
///
/// Called from whichever thread raised the event, never with engine locks
/// held, so implementations may call back into the engine.
pub trait EngineObserver: Send + Sync {
    fn on_engine_event(&self, event: EngineEvent);
}

/// Non-owning link to the observer. Events raised after the observer is gone
/// are dropped.
#[derive(Default)]
pub(crate) struct ObserverSlot {
    observer: Mutex<Option<Weak<dyn EngineObserver>>>,
}

impl ObserverSlot {
    pub(crate) fn set(&self, observer: Weak<dyn EngineObserver>) {
        *self.observer.lock() = Some(observer);
    }

    pub(crate) fn notify(&self, event: EngineEvent) {
        let observer = self.observer.lock().as_ref().and_then(Weak::upgrade);
        match observer {
            Some(observer) => observer.on_engine_event(event),
            None => trace!(?event, "no observer; event dropped"),
        }
    }
}
