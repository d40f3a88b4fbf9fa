//! Last-applied metadata per leaf path.

use fxhash::FxHashMap;
use leafsync_domain::ResolvedCommon;
use parking_lot::RwLock;

/// In-memory map of leaf path to the [`ResolvedCommon`] last written for it.
///
/// Entries are created on first synchronization, overwritten on every later one, and
/// only dropped when the owning subtree is deleted.
#[derive(Debug, Default)]
pub struct DefinitionCache {
    entries: RwLock<FxHashMap<String, ResolvedCommon>>,
}

impl DefinitionCache {
    #[must_use]
    pub fn get(&self, path: &str) -> Option<ResolvedCommon> {
        self.entries.read().get(path).cloned()
    }

    pub fn insert(&self, path: impl Into<String>, common: ResolvedCommon) {
        self.entries.write().insert(path.into(), common);
    }

    /// Drops `root` and every entry below it. Returns how many entries were removed.
    pub fn remove_subtree(&self, root: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|path, _| !is_within(path, root));
        before - entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// `true` when `path` is `root` itself or a descendant of it.
pub(crate) fn is_within(path: &str, root: &str) -> bool {
    path.strip_prefix(root).is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}
