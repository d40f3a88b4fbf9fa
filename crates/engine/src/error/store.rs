use std::borrow::Cow;

/// Failures reported by a [`StateStore`](crate::store::StateStore) implementation.
#[leafsync_derive::leafsync_error]
pub enum StoreError {
    #[error("Object not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Store rejected the request{}: {message}", format_context(.context))]
    Rejected { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Operation not supported by this store{}: {message}", format_context(.context))]
    Unsupported { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid leaf pattern{}: {source}", format_context(.context))]
    Pattern { source: globset::Error, context: Option<Cow<'static, str>> },

    #[error("Internal store error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
