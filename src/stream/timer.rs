//! Cancelable fire-once deadline.
//!
//! Used for the bounded-recording ceiling: [`RecordingTimer::start`] spawns a
//! task that sleeps and then runs its callback once.  Cancelling (or dropping)
//! the timer aborts the task, so the callback never runs after a manual stop.

use std::time::Duration;

use tokio::task::JoinHandle;

pub struct RecordingTimer {
    handle: JoinHandle<()>,
}

impl RecordingTimer {
    /// Run `on_fire` once after `after` unless cancelled first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F>(after: Duration, on_fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            on_fire();
        });
        Self { handle }
    }

    /// Abort the pending callback.  A no-op if it already ran.
    pub fn cancel(self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RecordingTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
