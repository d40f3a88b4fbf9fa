use crate::error::{LedgerError, StoreError};
use std::borrow::Cow;

/// Failure of one leaf synchronization, sweep or maintenance call.
#[leafsync_derive::leafsync_error]
pub enum SyncError {
    #[error("State store failure{}: {source}", format_context(.context))]
    Store { source: StoreError, context: Option<Cow<'static, str>> },

    #[error("Warn ledger failure{}: {source}", format_context(.context))]
    Ledger { source: LedgerError, context: Option<Cow<'static, str>> },

    #[error("Internal engine error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
