use std::borrow::Cow;

/// Failures while loading or persisting the warn ledger.
#[leafsync_derive::leafsync_error]
pub enum LedgerError {
    #[error("Ledger I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Ledger is not a flat JSON object{}: {source}", format_context(.context))]
    Format { source: serde_json::Error, context: Option<Cow<'static, str>> },

    #[error("Internal ledger error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
