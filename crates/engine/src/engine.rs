//! The [`SyncEngine`] handle and the state it owns.

use crate::builder::EngineBuilder;
use crate::cache::DefinitionCache;
use crate::catalog::AttributeCatalog;
use crate::ledger::WarnLedger;
use crate::sanitize::Sanitizer;
use crate::store::{MemoryStore, StateStore};
use crate::subscriptions::SubscriptionSet;
use crate::telemetry::Telemetry;
use crate::timers::ExpiryTimers;
use leafsync_domain::EngineConfig;
use std::ops::Deref;
use std::sync::Arc;
use tracing::info;

/// Everything one engine instance owns.
///
/// Nothing here is shared with other engines; two engines over two stores never see
/// each other's caches, timers or ledger.
#[derive(Debug)]
pub struct EngineInner<S> {
    pub(crate) store: S,
    pub(crate) catalog: AttributeCatalog,
    pub(crate) config: EngineConfig,
    pub(crate) sanitizer: Sanitizer,
    pub(crate) cache: DefinitionCache,
    pub(crate) subscriptions: SubscriptionSet,
    pub(crate) ledger: WarnLedger,
    pub(crate) timers: ExpiryTimers,
    pub(crate) telemetry: Telemetry,
}

impl<S> EngineInner<S> {
    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn catalog(&self) -> &AttributeCatalog {
        &self.catalog
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub const fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    pub const fn cache(&self) -> &DefinitionCache {
        &self.cache
    }

    pub const fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }

    pub const fn ledger(&self) -> &WarnLedger {
        &self.ledger
    }

    pub const fn timers(&self) -> &ExpiryTimers {
        &self.timers
    }
}

impl<S> Drop for EngineInner<S> {
    fn drop(&mut self) {
        self.timers.cancel_all();
    }
}

/// Handle to one synchronization engine over a [`StateStore`].
///
/// The handle is reference-counted and cheap to clone; every clone drives the same
/// caches, timers and ledger. Sibling branches of a traversal run as tasks holding clones.
///
/// # Example
///
/// ```rust
/// use leafsync_engine::{AttributeCatalog, MemoryLedger, MemoryStore, SyncEngine, TraverseOptions};
/// use serde_json::json;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), leafsync_engine::EngineError> {
///     let store = MemoryStore::new();
///     let engine = SyncEngine::builder()
///         .store(store.clone())
///         .catalog(AttributeCatalog::from_json(r#"{ "temp": { "unit": "°C" } }"#).unwrap())
///         .ledger(MemoryLedger::default())
///         .open()?;
///
///     engine
///         .flatten(json!({ "temp": 23.5, "humidity": 55 }), Some("device1"), TraverseOptions::default())
///         .await;
///
///     assert_eq!(store.leaf("device1.temp").unwrap().value, json!(23.5));
///     engine.close();
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct SyncEngine<S: StateStore = MemoryStore> {
    pub(crate) inner: Arc<EngineInner<S>>,
}

impl<S: StateStore> Clone for SyncEngine<S> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S: StateStore> Deref for SyncEngine<S> {
    type Target = EngineInner<S>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl SyncEngine {
    /// Starts configuring an engine. The store handed to `.store(..)` fixes its type.
    #[must_use = "The engine is not running until you call .open()"]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }
}

impl<S: StateStore> SyncEngine<S> {
    pub(crate) fn from_inner(inner: EngineInner<S>) -> Self {
        Self { inner: Arc::new(inner) }
    }

    /// Releases the engine's background work: every pending expiry timer is aborted.
    ///
    /// The caches stay readable; the handle can still synchronize afterwards, which
    /// re-arms timers as needed.
    pub fn close(&self) {
        let aborted = self.timers.cancel_all();
        info!(
            aborted_timers = aborted,
            cached_definitions = self.cache.len(),
            subscriptions = self.subscriptions.len(),
            "Sync engine closed"
        );
    }
}
