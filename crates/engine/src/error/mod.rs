//! Error enums of the engine and of its store boundary.
//!
//! Each enum lives in its own module so the helpers generated by
//! [`leafsync_derive::leafsync_error`] never collide.

mod catalog;
mod engine;
mod expr;
mod ledger;
mod modifier;
mod store;
mod sync;

pub use catalog::{CatalogError, CatalogErrorExt};
pub use engine::{EngineError, EngineErrorExt};
pub use expr::{ExprError, ExprErrorExt};
pub use ledger::{LedgerError, LedgerErrorExt};
pub use modifier::{ModifierError, ModifierErrorExt};
pub use store::{StoreError, StoreErrorExt};
pub use sync::{SyncError, SyncErrorExt};
