//! In-memory [`StateStore`] used by the CLI and the test suites.

use super::{StateStore, now_ms};
use crate::cache::is_within;
use crate::error::StoreError;
use fxhash::FxHashSet;
use globset::GlobBuilder;
use leafsync_domain::constants::DEFAULT_FORBIDDEN_CHARS;
use leafsync_domain::{ContainerKind, LeafState, LeafWrite, ResolvedCommon, StoreCapabilities};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::future::{Future, ready};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// One call received by a [`MemoryStore`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    CreateContainer { path: String, kind: ContainerKind, label: String },
    ContainerLabel { path: String },
    LeafMetadata { path: String },
    WriteMetadata { path: String, common: ResolvedCommon },
    WriteValue { path: String, write: LeafWrite },
    ReadValue { path: String },
    Query { pattern: String },
    Subscribe { path: String },
    DeleteRecursive { path: String },
    DeleteObject { path: String },
}

impl StoreCall {
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::CreateContainer { path, .. }
            | Self::ContainerLabel { path }
            | Self::LeafMetadata { path }
            | Self::WriteMetadata { path, .. }
            | Self::WriteValue { path, .. }
            | Self::ReadValue { path }
            | Self::Subscribe { path }
            | Self::DeleteRecursive { path }
            | Self::DeleteObject { path } => path,
            Self::Query { pattern } => pattern,
        }
    }
}

/// An externally-driven write delivered on a subscribed path.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub path: String,
    pub value: Value,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Default)]
struct LeafRecord {
    common: Option<ResolvedCommon>,
    state: Option<LeafState>,
}

#[derive(Debug, Default)]
struct Tree {
    containers: BTreeMap<String, (ContainerKind, String)>,
    leaves: BTreeMap<String, LeafRecord>,
}

#[derive(Debug)]
struct MemoryInner {
    forbidden: Vec<char>,
    capabilities: StoreCapabilities,
    tree: RwLock<Tree>,
    subscriptions: RwLock<FxHashSet<String>>,
    failing: RwLock<FxHashSet<String>>,
    journal: Mutex<Vec<StoreCall>>,
    changes: broadcast::Sender<StateChange>,
    clock: Mutex<u64>,
}

/// A complete state store held in process memory.
///
/// Write timestamps are epoch milliseconds, bumped past the previous write when two land
/// in the same millisecond, so a later write always carries a strictly larger timestamp.
///
/// Besides implementing [`StateStore`], it keeps a journal of every call for assertions,
/// can be told to reject writes to chosen paths, and can simulate external commands on
/// subscribed leaves through [`MemoryStore::external_write`].
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Store with the default forbidden set and every capability.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_FORBIDDEN_CHARS.to_vec(), StoreCapabilities::all())
    }

    #[must_use]
    pub fn with_capabilities(capabilities: StoreCapabilities) -> Self {
        Self::with_settings(DEFAULT_FORBIDDEN_CHARS.to_vec(), capabilities)
    }

    #[must_use]
    pub fn with_settings(forbidden: Vec<char>, capabilities: StoreCapabilities) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(MemoryInner {
                forbidden,
                capabilities,
                tree: RwLock::new(Tree::default()),
                subscriptions: RwLock::new(FxHashSet::default()),
                failing: RwLock::new(FxHashSet::default()),
                journal: Mutex::new(Vec::new()),
                changes,
                clock: Mutex::new(0),
            }),
        }
    }

    /// Makes every write to `path` fail with [`StoreError::Rejected`].
    pub fn fail_writes_to(&self, path: impl Into<String>) {
        self.inner.failing.write().insert(path.into());
    }

    /// Sets a leaf value with an explicit timestamp, bypassing the journal.
    pub fn seed_value(&self, path: &str, value: Value, timestamp: u64) {
        self.inner.tree.write().leaves.entry(path.to_owned()).or_default().state =
            Some(LeafState { value, acknowledged: true, timestamp });
    }

    /// Sets leaf metadata, bypassing the journal.
    pub fn seed_metadata(&self, path: &str, common: ResolvedCommon) {
        self.inner.tree.write().leaves.entry(path.to_owned()).or_default().common = Some(common);
    }

    /// Simulates a command written by someone other than the engine.
    ///
    /// The value is stored unacknowledged. Returns `true` when the path is subscribed and
    /// the change was published on [`MemoryStore::changes`].
    pub fn external_write(&self, path: &str, value: Value) -> bool {
        let timestamp = self.tick();
        self.inner.tree.write().leaves.entry(path.to_owned()).or_default().state =
            Some(LeafState { value: value.clone(), acknowledged: false, timestamp });

        if !self.inner.subscriptions.read().contains(path) {
            return false;
        }
        // No receiver is not an error, the change is simply unobserved.
        let _ = self.inner.changes.send(StateChange { path: path.to_owned(), value, timestamp });
        true
    }

    /// Stream of external writes on subscribed paths.
    #[must_use]
    pub fn changes(&self) -> broadcast::Receiver<StateChange> {
        self.inner.changes.subscribe()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.journal.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.inner.journal.lock().clear();
    }

    #[must_use]
    pub fn metadata_writes(&self, path: &str) -> usize {
        self.inner
            .journal
            .lock()
            .iter()
            .filter(|call| matches!(call, StoreCall::WriteMetadata { path: p, .. } if p == path))
            .count()
    }

    #[must_use]
    pub fn value_writes(&self, path: &str) -> Vec<LeafWrite> {
        self.inner
            .journal
            .lock()
            .iter()
            .filter_map(|call| match call {
                StoreCall::WriteValue { path: p, write } if p == path => Some(write.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn container(&self, path: &str) -> Option<(ContainerKind, String)> {
        self.inner.tree.read().containers.get(path).cloned()
    }

    #[must_use]
    pub fn container_paths(&self) -> Vec<String> {
        self.inner.tree.read().containers.keys().cloned().collect()
    }

    #[must_use]
    pub fn leaf(&self, path: &str) -> Option<LeafState> {
        self.inner.tree.read().leaves.get(path).and_then(|record| record.state.clone())
    }

    #[must_use]
    pub fn metadata(&self, path: &str) -> Option<ResolvedCommon> {
        self.inner.tree.read().leaves.get(path).and_then(|record| record.common.clone())
    }

    #[must_use]
    pub fn leaf_paths(&self) -> Vec<String> {
        self.inner.tree.read().leaves.keys().cloned().collect()
    }

    #[must_use]
    pub fn is_subscribed(&self, path: &str) -> bool {
        self.inner.subscriptions.read().contains(path)
    }

    /// Leaf values folded back into a nested JSON document along the dotted paths.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        let tree = self.inner.tree.read();
        let mut root = Map::new();
        for (path, record) in &tree.leaves {
            if let Some(state) = &record.state {
                let segments: Vec<&str> = path.split('.').collect();
                insert_nested(&mut root, &segments, state.value.clone());
            }
        }
        Value::Object(root)
    }

    fn tick(&self) -> u64 {
        let mut last = self.inner.clock.lock();
        *last = now_ms().max(*last + 1);
        *last
    }

    fn log(&self, call: StoreCall) {
        trace!(?call, "Store call");
        self.inner.journal.lock().push(call);
    }

    fn guard(&self, path: &str) -> Result<(), StoreError> {
        if self.inner.failing.read().contains(path) {
            return Err(StoreError::Rejected { message: path.to_owned().into(), context: None });
        }
        Ok(())
    }

    fn put_container(&self, path: &str, kind: ContainerKind, label: &str) -> Result<(), StoreError> {
        self.log(StoreCall::CreateContainer { path: path.to_owned(), kind, label: label.to_owned() });
        self.guard(path)?;
        self.inner.tree.write().containers.insert(path.to_owned(), (kind, label.to_owned()));
        Ok(())
    }

    fn put_metadata(&self, path: &str, common: &ResolvedCommon) -> Result<(), StoreError> {
        self.log(StoreCall::WriteMetadata { path: path.to_owned(), common: common.clone() });
        self.guard(path)?;
        self.inner.tree.write().leaves.entry(path.to_owned()).or_default().common = Some(common.clone());
        Ok(())
    }

    fn put_value(&self, path: &str, write: LeafWrite) -> Result<(), StoreError> {
        self.log(StoreCall::WriteValue { path: path.to_owned(), write: write.clone() });
        self.guard(path)?;
        let state = LeafState { value: write.value, acknowledged: write.acknowledged, timestamp: self.tick() };
        self.inner.tree.write().leaves.entry(path.to_owned()).or_default().state = Some(state);
        Ok(())
    }

    fn query(&self, pattern: &str) -> Result<BTreeMap<String, LeafState>, StoreError> {
        self.log(StoreCall::Query { pattern: pattern.to_owned() });
        let matcher = GlobBuilder::new(pattern).literal_separator(false).build()?.compile_matcher();
        let tree = self.inner.tree.read();
        Ok(tree
            .leaves
            .iter()
            .filter(|(path, _)| matcher.is_match(path.as_str()))
            .filter_map(|(path, record)| record.state.clone().map(|state| (path.clone(), state)))
            .collect())
    }

    fn remove_recursive(&self, path: &str) -> Result<(), StoreError> {
        self.log(StoreCall::DeleteRecursive { path: path.to_owned() });
        if !self.inner.capabilities.contains(StoreCapabilities::RECURSIVE_DELETE) {
            return Err(StoreError::Unsupported { message: "recursive delete".into(), context: None });
        }
        self.guard(path)?;
        let mut tree = self.inner.tree.write();
        tree.containers.retain(|p, _| !is_within(p, path));
        tree.leaves.retain(|p, _| !is_within(p, path));
        drop(tree);
        self.inner.subscriptions.write().retain(|p| !is_within(p, path));
        debug!(path, "Subtree deleted");
        Ok(())
    }

    fn remove_object(&self, path: &str) -> Result<(), StoreError> {
        self.log(StoreCall::DeleteObject { path: path.to_owned() });
        self.guard(path)?;
        let mut tree = self.inner.tree.write();
        let removed = tree.leaves.remove(path).is_some() | tree.containers.remove(path).is_some();
        drop(tree);
        if !removed {
            return Err(StoreError::NotFound { message: path.to_owned().into(), context: None });
        }
        self.inner.subscriptions.write().remove(path);
        Ok(())
    }
}

impl StateStore for MemoryStore {
    fn forbidden_chars(&self) -> Vec<char> {
        self.inner.forbidden.clone()
    }

    fn capabilities(&self) -> StoreCapabilities {
        self.inner.capabilities
    }

    fn create_or_update_container(
        &self,
        path: &str,
        kind: ContainerKind,
        label: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        ready(self.put_container(path, kind, label))
    }

    fn container_label(&self, path: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send {
        self.log(StoreCall::ContainerLabel { path: path.to_owned() });
        ready(Ok(self.inner.tree.read().containers.get(path).map(|(_, label)| label.clone())))
    }

    fn leaf_metadata(&self, path: &str) -> impl Future<Output = Result<Option<ResolvedCommon>, StoreError>> + Send {
        self.log(StoreCall::LeafMetadata { path: path.to_owned() });
        ready(Ok(self.metadata(path)))
    }

    fn write_leaf_metadata(
        &self,
        path: &str,
        common: &ResolvedCommon,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        ready(self.put_metadata(path, common))
    }

    fn write_leaf_value(&self, path: &str, write: LeafWrite) -> impl Future<Output = Result<(), StoreError>> + Send {
        ready(self.put_value(path, write))
    }

    fn read_leaf_value(&self, path: &str) -> impl Future<Output = Result<Option<LeafState>, StoreError>> + Send {
        self.log(StoreCall::ReadValue { path: path.to_owned() });
        ready(Ok(self.leaf(path)))
    }

    fn query_leaves(
        &self,
        pattern: &str,
    ) -> impl Future<Output = Result<BTreeMap<String, LeafState>, StoreError>> + Send {
        ready(self.query(pattern))
    }

    fn subscribe(&self, path: &str) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.log(StoreCall::Subscribe { path: path.to_owned() });
        let result = self.guard(path).map(|()| {
            self.inner.subscriptions.write().insert(path.to_owned());
        });
        ready(result)
    }

    fn delete_recursive(&self, path: &str) -> impl Future<Output = Result<(), StoreError>> + Send {
        ready(self.remove_recursive(path))
    }

    fn delete_object(&self, path: &str) -> impl Future<Output = Result<(), StoreError>> + Send {
        ready(self.remove_object(path))
    }
}

fn insert_nested(node: &mut Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => {},
        [last] => {
            node.insert((*last).to_owned(), value);
        },
        [head, rest @ ..] => {
            let child = node.entry(*head).or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                insert_nested(map, rest, value);
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn glob_query_matches_dotted_paths() {
        let store = MemoryStore::new();
        store.seed_value("dev.temp", json!(1), 10);
        store.seed_value("dev.sub.hum", json!(2), 10);
        store.seed_value("other.temp", json!(3), 10);

        let hits = store.query_leaves("dev.*").await.unwrap();
        assert_eq!(hits.keys().collect::<Vec<_>>(), ["dev.sub.hum", "dev.temp"]);
        assert!(store.query_leaves("dev.[").await.is_err());
    }

    #[tokio::test]
    async fn recursive_delete_is_capability_gated() {
        let store = MemoryStore::with_capabilities(StoreCapabilities::empty());
        store.seed_value("dev.temp", json!(1), 10);
        let err = store.delete_recursive("dev").await.unwrap_err();
        assert_eq!(err.kind(), "unsupported");
        assert!(store.leaf("dev.temp").is_some());
    }

    #[tokio::test]
    async fn external_writes_reach_subscribers_only() {
        let store = MemoryStore::new();
        let mut changes = store.changes();
        store.subscribe("dev.switch").await.unwrap();

        assert!(!store.external_write("dev.other", json!(true)));
        assert!(store.external_write("dev.switch", json!(true)));

        let change = changes.recv().await.unwrap();
        assert_eq!(change.path, "dev.switch");
        assert_eq!(change.value, json!(true));
        assert!(!store.leaf("dev.switch").unwrap().acknowledged);
    }

    #[tokio::test]
    async fn back_to_back_writes_get_increasing_timestamps() {
        let store = MemoryStore::new();
        let mut previous = 0;
        for n in 0..50 {
            let path = format!("dev.leaf{}", n % 3);
            store.write_leaf_value(&path, LeafWrite::acknowledged(json!(n))).await.unwrap();
            let stamped = store.leaf(&path).unwrap().timestamp;
            assert!(stamped > previous, "write {n} stamped {stamped} after {previous}");
            previous = stamped;
        }
        store.subscribe("dev.switch").await.unwrap();
        assert!(store.external_write("dev.switch", json!(true)));
        assert!(store.leaf("dev.switch").unwrap().timestamp > previous);
    }

    #[test]
    fn snapshot_nests_leaves() {
        let store = MemoryStore::new();
        store.seed_value("dev.temp", json!(21.5), 1);
        store.seed_value("dev.sensors.0.value", json!(1), 1);
        assert_eq!(store.snapshot(), json!({ "dev": { "temp": 21.5, "sensors": { "0": { "value": 1 } } } }));
    }
}
