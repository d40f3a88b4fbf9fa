//! Subtree deletion, null-leaf cleanup and version announcements.

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncErrorExt};
use crate::store::StateStore;
use crate::telemetry::Report;
use leafsync_domain::StoreCapabilities;
use leafsync_domain::constants::VERSION_INFO_KEY;
use tracing::{debug, info, warn};

impl<S: StateStore> SyncEngine<S> {
    /// Deletes `root` and everything below it, dropping the engine's cache, subscription
    /// and timer entries for that subtree.
    ///
    /// Returns `Ok(false)` without touching anything when the store cannot delete
    /// recursively.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] when the store rejects the deletion.
    pub async fn delete_subtree(&self, root: &str) -> Result<bool, SyncError> {
        if !self.store.capabilities().contains(StoreCapabilities::RECURSIVE_DELETE) {
            warn!(root, "Store cannot delete recursively, subtree kept");
            return Ok(false);
        }

        let root = self.sanitizer.sanitize(root).into_owned();
        self.store.delete_recursive(&root).await.context(format!("Deleting subtree {root}"))?;

        let definitions = self.cache.remove_subtree(&root);
        let subscriptions = self.subscriptions.remove_subtree(&root);
        let timers = self.timers.cancel_subtree(&root);
        info!(root = %root, definitions, subscriptions, timers, "Subtree deleted");
        Ok(true)
    }

    /// Deletes every leaf matching `pattern` whose value is null. Returns the deleted paths.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] when enumeration or a deletion fails.
    pub async fn delete_null_leaves(&self, pattern: &str) -> Result<Vec<String>, SyncError> {
        let leaves = self.store.query_leaves(pattern).await.context(format!("Enumerating {pattern}"))?;
        let mut deleted = Vec::new();
        for (path, state) in leaves {
            if !state.value.is_null() {
                continue;
            }
            self.store.delete_object(&path).await.context(format!("Deleting {path}"))?;
            self.cache.remove_subtree(&path);
            self.subscriptions.remove_subtree(&path);
            debug!(path = %path, "Null leaf deleted");
            deleted.push(path);
        }
        Ok(deleted)
    }

    /// Records the running version in the warn ledger and reports it at info level, but
    /// only when it differs from the version recorded last.
    ///
    /// Returns whether the announcement was new.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Ledger`] when the ledger cannot be persisted.
    pub async fn announce_version(&self, version: &str) -> Result<bool, SyncError> {
        let message = format!("Started in version {version}");
        if !self.ledger.replace(VERSION_INFO_KEY, message.clone()).await.context("Recording version")? {
            debug!(version, "Version already announced");
            return Ok(false);
        }
        info!(version, "{message}");
        self.telemetry.report(Report::info(message).tag("version", version));
        Ok(true)
    }
}
