use crate::error::ExprError;
use std::borrow::Cow;

/// Failure of a single modifier operation. The pipeline recovers from every variant.
#[leafsync_derive::leafsync_error]
pub enum ModifierError {
    #[error("Value is not numeric{}: {message}", format_context(.context))]
    NotNumeric { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid operation argument{}: {message}", format_context(.context))]
    InvalidArgument { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Result is not a finite number{}: {message}", format_context(.context))]
    NonFinite { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Custom expression failed{}: {source}", format_context(.context))]
    Expression { source: ExprError, context: Option<Cow<'static, str>> },
}
