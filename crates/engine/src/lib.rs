//! Synchronization of arbitrary nested JSON into a flat, path-addressed tree of typed
//! leaves held by an external state store.
//!
//! # Core Features
//!
//! - **Flattening**: objects become device/channel/folder containers by depth, arrays of
//!   objects become indexed containers, everything else becomes a leaf.
//! - **Metadata Diffing**: leaf metadata is resolved from a static [`AttributeCatalog`] and
//!   only rewritten when it actually changed.
//! - **Value Modifiers**: arithmetic, rounding, text case, parsing and a sandboxed
//!   `custom:` expression language, applied before every value write.
//! - **Liveness**: an expiry timer on the liveness leaf and pattern sweeps that null leaves
//!   not refreshed since the source was last seen online.
//! - **Warn Ledger**: unknown attribute names are reported once per name, across restarts.
//!
//! # Architectural Overview
//!
//! 1. **[`SyncEngine`]**: the reference-counted handle owning caches, timers and ledger.
//! 2. **[`EngineBuilder`]**: typestate builder; `open()` exists once a store is set.
//! 3. **[`StateStore`]**: the async store boundary, with [`MemoryStore`] as reference
//!    implementation.
//!
//! # Examples
//!
//! ```rust
//! use leafsync_engine::{MemoryLedger, MemoryStore, SyncEngine, TraverseOptions};
//! use leafsync_domain::ContainerKind;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), leafsync_engine::EngineError> {
//! let store = MemoryStore::new();
//! let engine = SyncEngine::builder().store(store.clone()).ledger(MemoryLedger::default()).open()?;
//!
//! let payload = json!({ "room": { "sensors": [{ "value": 1 }], "tags": ["a", "b"] } });
//! engine.flatten(payload, None, TraverseOptions::default()).await;
//!
//! assert_eq!(store.container("room").map(|(kind, _)| kind), Some(ContainerKind::Channel));
//! assert_eq!(store.leaf("room.sensors.0.value").unwrap().value, json!(1));
//! assert_eq!(store.leaf("room.tags").unwrap().value, json!(r#"["a","b"]"#));
//! # Ok(())
//! # }
//! ```

mod builder;
mod cache;
mod catalog;
mod engine;
mod error;
mod flatten;
mod ledger;
mod liveness;
mod maintenance;
pub mod modifier;
mod sanitize;
mod store;
mod subscriptions;
mod synchronizer;
mod telemetry;
mod timers;

pub use builder::{EngineBuilder, NoStore, WithStore};
pub use cache::DefinitionCache;
pub use catalog::AttributeCatalog;
pub use engine::{EngineInner, SyncEngine};
pub use error::*;
pub use flatten::{Shape, TraverseOptions};
pub use ledger::{FileLedger, LedgerBackend, LedgerEntries, MemoryLedger, Recorded, SaveFuture, WarnLedger};
pub use liveness::SweepOutcome;
pub use sanitize::Sanitizer;
pub use store::{MemoryStore, StateChange, StateStore, StoreCall};
pub use subscriptions::SubscriptionSet;
pub use synchronizer::{LeafOutcome, needs_update, resolve, runtime_type};
pub use telemetry::{DiscardSink, Report, ReportLevel, ReportSink, Telemetry};
pub use timers::ExpiryTimers;
