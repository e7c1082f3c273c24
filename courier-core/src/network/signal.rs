//! Interruptible waits shared by the connection workers.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// One-shot stop flag with timed, interruptible waits.
#[derive(Debug, Default)]
pub(crate) struct StopSignal {
    stopped: Mutex<bool>,
    cond: Condvar,
}

impl StopSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn trigger(&self) {
        *self.stopped.lock() = true;
        self.cond.notify_all();
    }

    pub(crate) fn reset(&self) {
        *self.stopped.lock() = false;
    }

    pub(crate) fn is_triggered(&self) -> bool {
        *self.stopped.lock()
    }

    /// Waits up to `timeout`. Returns true if the signal was triggered.
    pub(crate) fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.cond.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}
