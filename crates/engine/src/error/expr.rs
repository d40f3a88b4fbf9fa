use std::borrow::Cow;

/// Failures of the `custom:` expression interpreter.
#[leafsync_derive::leafsync_error]
pub enum ExprError {
    #[error("Expression syntax error{} at offset {offset}: {message}", format_context(.context))]
    Syntax { offset: usize, message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Expression type error{}: {message}", format_context(.context))]
    Type { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
