use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Lifecycle of a relay worker or of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Stopped,
    Running,
}

pub type RelayWorkerState = RunState;

/// Run flag shared between a worker thread and its owner.
///
/// `sleep` is the worker's back-off: it returns early as soon as `stop` is
/// called, so a stop never waits out a full back-off period.
#[derive(Debug, Default)]
pub struct RunFlag {
    running: Mutex<bool>,
    changed: Condvar,
}

impl RunFlag {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start(&self) {
        *self.lock() = true;
    }

    pub fn stop(&self) {
        *self.lock() = false;
        self.changed.notify_all();
    }

    pub fn is_running(&self) -> bool {
        *self.lock()
    }

    pub fn state(&self) -> RunState {
        if self.is_running() {
            RunState::Running
        } else {
            RunState::Stopped
        }
    }

    /// Sleep for `duration` unless stopped first. Returns whether the flag is
    /// still set afterwards.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut running = self.lock();
        while *running {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            running = self
                .changed
                .wait_timeout(running, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
        *running
    }
}
