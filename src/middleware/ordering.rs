use std::sync::Arc;

use parking_lot::Mutex;

/// Per-request gate that delivers lifecycle hooks one at a time when strict
/// event ordering is on, and is a no-op otherwise.
///
/// Each request gets its own gate, so strict mode never makes one request
/// wait on another's hooks. The observer behind it stays lock-free either way.
#[derive(Clone, Default)]
pub struct OrderingGate {
    lock: Option<Arc<Mutex<()>>>,
}

impl OrderingGate {
    pub fn new(strict: bool) -> Self {
        Self {
            lock: strict.then(|| Arc::new(Mutex::new(()))),
        }
    }

    pub fn is_strict(&self) -> bool {
        self.lock.is_some()
    }

    /// Runs `f`, serialized against every other `run` on this gate.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.lock {
            Some(lock) => {
                let _held = lock.lock();
                f()
            }
            None => f(),
        }
    }
}
