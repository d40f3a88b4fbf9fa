use std::borrow::Cow;

/// Failures while loading the attribute catalog.
#[leafsync_derive::leafsync_error]
pub enum CatalogError {
    #[error("Catalog I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Malformed attribute catalog{}: {source}", format_context(.context))]
    Parse { source: serde_json::Error, context: Option<Cow<'static, str>> },
}
