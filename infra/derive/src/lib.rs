#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the leafsync crates.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! leafsync-derive.workspace = true
//! thiserror.workspace = true
//! ```

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Attribute macro for defining the error enums of the engine and its collaborators.
///
/// # Features
///
/// * **Automatic Derives**: Injects `#[derive(Debug, thiserror::Error)]` when missing.
/// * **Context Support**: Generates a companion `<Name>Ext` trait that adds `.context(..)`
///   to `Result<T, Name>` and to `Result<T, Source>` for every wrapped source error.
/// * **Standard Conversions**: Implements `From<Source>` for variants holding a `source` field
///   (or a field marked `#[source]`/`#[from]`), so `?` works on upstream errors.
/// * **Internal Fallback**: `From<&'static str>` and `From<String>` when an `Internal` variant exists.
/// * **Kind Tag**: `kind()` returns the `snake_case` variant name, used as a stable label in
///   structured logs and telemetry reports.
///
/// # Requirements
///
/// 1. The macro must be applied to an **enum** with named-field variants.
/// 2. Variants wrapping a source must also carry `context: Option<Cow<'static, str>>`.
///
/// # Example
///
/// ```rust,ignore
/// use leafsync_derive::leafsync_error;
/// use std::borrow::Cow;
///
/// #[leafsync_error]
/// pub enum LedgerError {
///     #[error("Ledger I/O failure{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal ledger error{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn load(path: &std::path::Path) -> Result<String, LedgerError> {
///     std::fs::read_to_string(path).context("Reading warn ledger")
/// }
///
/// assert_eq!(LedgerError::from("boom").kind(), "internal");
/// ```
#[proc_macro_attribute]
pub fn leafsync_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}
