//! Cancellable liveness expiry timers, at most one per leaf path.

use crate::cache::is_within;
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::AbortHandle;

#[derive(Debug, Default)]
pub struct ExpiryTimers {
    next_id: AtomicU64,
    slots: Mutex<FxHashMap<String, (u64, AbortHandle)>>,
}

impl ExpiryTimers {
    /// Installs the timer produced by `spawn` for `path`, aborting the one it supersedes.
    ///
    /// `spawn` receives the generation id the timer must present to [`ExpiryTimers::finish`].
    /// It runs under the slot lock, so a timer can never finish before it is registered.
    pub(crate) fn arm(&self, path: &str, spawn: impl FnOnce(u64) -> AbortHandle) {
        let mut slots = self.slots.lock();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = spawn(id);
        if let Some((_, previous)) = slots.insert(path.to_owned(), (id, handle)) {
            previous.abort();
        }
    }

    /// Called by a timer that ran out. Returns `false` when it was superseded meanwhile,
    /// in which case it must not write.
    pub(crate) fn finish(&self, path: &str, id: u64) -> bool {
        let mut slots = self.slots.lock();
        if slots.get(path).is_some_and(|(current, _)| *current == id) {
            slots.remove(path);
            return true;
        }
        false
    }

    pub fn cancel(&self, path: &str) -> bool {
        self.slots.lock().remove(path).map(|(_, handle)| handle.abort()).is_some()
    }

    pub fn cancel_subtree(&self, root: &str) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|path, (_, handle)| {
            let inside = is_within(path, root);
            if inside {
                handle.abort();
            }
            !inside
        });
        before - slots.len()
    }

    pub fn cancel_all(&self) -> usize {
        let mut slots = self.slots.lock();
        let count = slots.len();
        for (_, (_, handle)) in slots.drain() {
            handle.abort();
        }
        count
    }

    #[must_use]
    pub fn is_armed(&self, path: &str) -> bool {
        self.slots.lock().contains_key(path)
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.slots.lock().len()
    }
}
