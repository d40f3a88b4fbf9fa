/// Reserved leaf name whose writes anchor liveness and staleness.
pub const LIVENESS_KEY: &str = "online";

/// Role assigned when the attribute definition does not name one.
pub const DEFAULT_ROLE: &str = "state";

/// Type assigned to leaves whose runtime value carries no type (null or absent).
pub const MIXED_TYPE: &str = "mixed";

/// Ledger key holding the last announced engine version.
pub const VERSION_INFO_KEY: &str = "versionInfo";

/// Characters the reference store rejects in object identifiers.
pub const DEFAULT_FORBIDDEN_CHARS: &[char] = &[']', '[', '*', ',', ';', '\'', '"', '`', '<', '>', '?'];

/// Replacement for every forbidden character and for empty path segments.
pub const REPLACEMENT_CHAR: char = '_';
