//! The boundary to the hierarchical state store the engine writes into.

mod memory;

pub use memory::{MemoryStore, StateChange, StoreCall};

use crate::error::StoreError;
use leafsync_domain::{ContainerKind, LeafState, LeafWrite, ResolvedCommon, StoreCapabilities};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::{SystemTime, UNIX_EPOCH};

/// A hierarchical, path-addressed object store.
///
/// Paths handed to a store are always sanitized against [`StateStore::forbidden_chars`].
/// Every method may be called concurrently from many leaf tasks.
pub trait StateStore: Send + Sync + 'static {
    /// Characters that must not appear in an object identifier.
    fn forbidden_chars(&self) -> Vec<char>;

    fn capabilities(&self) -> StoreCapabilities;

    /// Creates the container at `path` or updates its kind and label.
    fn create_or_update_container(
        &self,
        path: &str,
        kind: ContainerKind,
        label: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Label previously stored for the container at `path`.
    fn container_label(&self, path: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Metadata currently stored for the leaf at `path`.
    fn leaf_metadata(&self, path: &str) -> impl Future<Output = Result<Option<ResolvedCommon>, StoreError>> + Send;

    /// Creates the leaf at `path` or replaces its metadata.
    fn write_leaf_metadata(
        &self,
        path: &str,
        common: &ResolvedCommon,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn write_leaf_value(&self, path: &str, write: LeafWrite) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn read_leaf_value(&self, path: &str) -> impl Future<Output = Result<Option<LeafState>, StoreError>> + Send;

    /// Values of every leaf whose path matches the glob `pattern`.
    fn query_leaves(
        &self,
        pattern: &str,
    ) -> impl Future<Output = Result<BTreeMap<String, LeafState>, StoreError>> + Send;

    /// Registers `path` for change notification.
    fn subscribe(&self, path: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes `path` and everything below it. Only called when
    /// [`StoreCapabilities::RECURSIVE_DELETE`] is advertised.
    fn delete_recursive(&self, path: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes the single object at `path`.
    fn delete_object(&self, path: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Wall-clock milliseconds since the Unix epoch, the unit of [`LeafState::timestamp`].
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_millis() as u64)
}
