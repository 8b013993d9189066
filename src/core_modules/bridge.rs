// THEORY:
// The `DriveBridge` is the only thing the frame callback and the drive worker
// share. It has three parts:
//
// 1.  **Targets**: the requested `MotorPowers`, behind a single mutex. Both
//     axes are written together and read together, so the worker can never
//     observe a pan value from one frame next to a tilt value from another.
// 2.  **Wake signal**: a `Notify` used as an auto-reset event. `notify_one`
//     with no waiter stores a single permit; any number of further signals
//     before the worker wakes collapse into that one permit. The worker then
//     reads whatever the targets are *now*: latest wins, nothing is queued.
// 3.  **Exit flag**: checked by the worker on every wake, before it touches
//     the targets.
//
// The producer side never blocks: publishing is a short critical section
// followed by a non-blocking notify. The consumer blocks indefinitely, with
// no timeout, until the next signal.

use crate::core_modules::controller::MotorPowers;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct DriveBridge {
    targets: Mutex<MotorPowers>,
    wake: Notify,
    exit: AtomicBool,
}

impl DriveBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces both targets at once and wakes the worker.
    pub fn publish(&self, powers: MotorPowers) {
        *self.targets.lock() = powers;
        self.signal();
    }

    /// Edits the targets under the lock, then wakes the worker.
    pub fn update<F: FnOnce(&mut MotorPowers)>(&self, edit: F) {
        edit(&mut *self.targets.lock());
        self.signal();
    }

    /// Wakes the worker without changing the targets.
    pub fn signal(&self) {
        self.wake.notify_one();
    }

    /// A consistent copy of the current targets.
    pub fn latest(&self) -> MotorPowers {
        *self.targets.lock()
    }

    /// Asks the worker to stop at its next wake, and wakes it.
    pub fn request_exit(&self) {
        self.exit.store(true, Ordering::SeqCst);
        self.signal();
    }

    pub fn is_exit_requested(&self) -> bool {
        self.exit.load(Ordering::SeqCst)
    }

    /// Waits for the next signal. Returns the latest targets, or `None` once
    /// exit has been requested.
    pub async fn wait(&self) -> Option<MotorPowers> {
        self.wake.notified().await;
        if self.is_exit_requested() {
            return None;
        }
        Some(self.latest())
    }
}
