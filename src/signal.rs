//! Wake-up primitive for the dispatcher loop.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Condvar;
use parking_lot::Mutex;

/// A latched wake-up signal for the scheduler that owns the engine.
///
/// The engine raises the signal whenever a disk, unit or request state
/// change could unblock a pending request; the scheduler consumes it and
/// re-walks its pending list. Handles are cheap to clone and may be raised
/// from any thread, which lets completed asynchronous work wake the
/// scheduler before its result is posted back.
#[derive(Clone, Debug, Default)]
pub struct StageSignal {
    inner: Arc<SignalInner>,
}

#[derive(Debug, Default)]
struct SignalInner {
    raised: Mutex<bool>,
    condvar: Condvar,
}

impl StageSignal {
    /// Create a signal in the unraised state.
    pub fn new() -> StageSignal {
        StageSignal::default()
    }

    /// Raise the signal, waking any waiter.
    pub fn raise(&self) {
        let mut raised = self.inner.raised.lock();
        *raised = true;
        self.inner.condvar.notify_all();
    }

    /// Consume the signal, returning whether it was raised.
    pub fn take(&self) -> bool {
        let mut raised = self.inner.raised.lock();
        std::mem::replace(&mut *raised, false)
    }

    /// Block until the signal is raised, then consume it.
    pub fn wait(&self) {
        let mut raised = self.inner.raised.lock();
        while !*raised {
            self.inner.condvar.wait(&mut raised);
        }
        *raised = false;
    }

    /// Block until the signal is raised or the timeout elapses. Returns
    /// whether the signal was raised (and consumed).
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let mut raised = self.inner.raised.lock();
        if !*raised {
            let _ = self.inner.condvar.wait_for(&mut raised, timeout);
        }
        std::mem::replace(&mut *raised, false)
    }
}
