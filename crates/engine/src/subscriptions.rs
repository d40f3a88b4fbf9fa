use fxhash::FxHashSet;
use parking_lot::Mutex;

/// Paths registered with the store for change notification.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    paths: Mutex<FxHashSet<String>>,
}

impl SubscriptionSet {
    /// Records `path`; returns `false` when it was already present.
    ///
    /// The membership check and the insert happen under one lock, so concurrent callers
    /// for the same path see exactly one `true`.
    pub fn claim(&self, path: &str) -> bool {
        let mut paths = self.paths.lock();
        if paths.contains(path) {
            return false;
        }
        paths.insert(path.to_owned())
    }

    /// Gives a claim back after the store refused the subscription.
    pub fn release(&self, path: &str) {
        self.paths.lock().remove(path);
    }

    pub fn remove_subtree(&self, root: &str) -> usize {
        let mut paths = self.paths.lock();
        let before = paths.len();
        paths.retain(|path| !crate::cache::is_within(path, root));
        before - paths.len()
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.paths.lock().contains(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.lock().len()
    }
}
