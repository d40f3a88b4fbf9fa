//! Store-safe identifiers.

use fxhash::FxHashSet;
use leafsync_domain::constants::{DEFAULT_FORBIDDEN_CHARS, REPLACEMENT_CHAR};
use std::borrow::Cow;

/// Rewrites raw key and id fragments into identifiers the store accepts.
///
/// Every character of the forbidden set is replaced with `_`. The rewrite is total,
/// pure and idempotent, so already-clean paths pass through without allocating.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    forbidden: FxHashSet<char>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_FORBIDDEN_CHARS.iter().copied())
    }
}

impl Sanitizer {
    #[must_use]
    pub fn new(forbidden: impl IntoIterator<Item = char>) -> Self {
        Self { forbidden: forbidden.into_iter().collect() }
    }

    /// `true` when `raw` holds no forbidden character.
    #[must_use]
    pub fn is_clean(&self, raw: &str) -> bool {
        !raw.chars().any(|ch| self.forbidden.contains(&ch))
    }

    #[must_use]
    pub fn sanitize<'a>(&self, raw: &'a str) -> Cow<'a, str> {
        if self.is_clean(raw) {
            return Cow::Borrowed(raw);
        }
        Cow::Owned(
            raw.chars()
                .map(|ch| if self.forbidden.contains(&ch) { REPLACEMENT_CHAR } else { ch })
                .collect(),
        )
    }

    /// Appends `segment` to `parent` and sanitizes the result.
    ///
    /// An empty segment becomes `_`, so joined paths never hold empty segments.
    #[must_use]
    pub fn join(&self, parent: Option<&str>, segment: &str) -> String {
        let segment = if segment.is_empty() { "_" } else { segment };
        let joined = match parent {
            Some(parent) if !parent.is_empty() => format!("{parent}.{segment}"),
            _ => segment.to_owned(),
        };
        self.sanitize(&joined).into_owned()
    }
}
