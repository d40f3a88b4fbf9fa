//! Staleness detection anchored on the liveness leaf.

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncErrorExt};
use crate::store::{StateStore, now_ms};
use crate::telemetry::Report;
use leafsync_domain::{LeafState, LeafWrite};
use serde_json::Value;
use tracing::{debug, error, trace};

/// Result of one sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The liveness leaf was missing or not truthy; nothing was touched.
    Aborted,
    /// Paths written to null, in enumeration order.
    Completed { nulled: Vec<String> },
}

impl<S: StateStore> SyncEngine<S> {
    /// Nulls every leaf matching `pattern` that was not refreshed since the liveness leaf.
    ///
    /// Never fails; errors are logged and reported, and the sweep reports as aborted.
    pub async fn sweep(&self, pattern: &str) -> SweepOutcome {
        match self.try_sweep(pattern).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(pattern, error = %err, "Error in function sweep");
                self.telemetry.report(
                    Report::error(format!("Sweep of '{pattern}' failed: {err}")).tag("kind", err.kind()),
                );
                SweepOutcome::Aborted
            },
        }
    }

    /// # Errors
    ///
    /// Returns [`SyncError::Store`] when reading, enumerating or nulling fails. Leaves
    /// nulled before the failure stay nulled.
    pub async fn try_sweep(&self, pattern: &str) -> Result<SweepOutcome, SyncError> {
        debug!(pattern, "Sweep started");
        let liveness_key = self.config.liveness_key.as_str();

        let online = self.store.read_leaf_value(liveness_key).await.context("Reading liveness leaf")?;
        let Some(online) = online.filter(LeafState::is_truthy) else {
            error!(key = liveness_key, "Source is offline or liveness leaf not found, aborting sweep");
            self.telemetry.report(
                Report::warning(format!("Sweep of '{pattern}' aborted: '{liveness_key}' is missing or false"))
                    .tag("kind", "sweep_abort"),
            );
            return Ok(SweepOutcome::Aborted);
        };
        let online_ts = online.timestamp;

        tokio::time::sleep(self.config.settle_delay()).await;

        let leaves = self.store.query_leaves(pattern).await.context(format!("Enumerating {pattern}"))?;
        let mut nulled = Vec::new();
        for (path, state) in leaves {
            if path == liveness_key || state.value.is_null() {
                continue;
            }
            trace!(path = %path, leaf_ts = state.timestamp, online_ts, "Sweep candidate");
            if online_ts >= state.timestamp {
                self.store
                    .write_leaf_value(&path, LeafWrite::acknowledged(Value::Null))
                    .await
                    .context(format!("Nulling {path}"))?;
                debug!(path = %path, "Stale leaf set to null");
                nulled.push(path);
            }
        }
        debug!(pattern, nulled = nulled.len(), "Sweep done");
        Ok(SweepOutcome::Completed { nulled })
    }

    /// Writes `true` to the liveness leaf unless it was written within the refresh window.
    ///
    /// Returns whether the leaf was rewritten.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] when the liveness leaf cannot be read or written.
    pub async fn mark_online(&self) -> Result<bool, SyncError> {
        let key = self.config.liveness_key.clone();
        let last = self.store.read_leaf_value(&key).await.context("Reading liveness leaf")?;
        let last_ts = last.map_or(0, |state| state.timestamp);
        let refresh_ms = u64::try_from(self.config.online_refresh().as_millis()).unwrap_or(u64::MAX);

        if now_ms().saturating_sub(last_ts) <= refresh_ms {
            trace!(key = %key, last_ts, "Liveness leaf fresh, not rewritten");
            return Ok(false);
        }
        self.try_synchronize(&key, &key, Some(Value::Bool(true))).await?;
        Ok(true)
    }
}
