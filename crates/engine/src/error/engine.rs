use std::borrow::Cow;

/// Failures while opening a [`SyncEngine`](crate::SyncEngine).
#[leafsync_derive::leafsync_error]
pub enum EngineError {
    #[error("Invalid engine configuration{}: {message}", format_context(.context))]
    InvalidConfig { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal engine error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
