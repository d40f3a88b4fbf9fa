//! Attribute definitions (static input) and the resolved metadata written to the store.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Static description of a leaf, keyed by leaf *name* in the attribute catalog.
///
/// Every field is optional; missing fields fall back to the defaults applied when
/// the definition is resolved into a [`ResolvedCommon`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeDefinition {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub value_type: Option<String>,
    pub read: Option<bool>,
    pub write: Option<bool>,
    pub role: Option<String>,
    pub unit: Option<String>,
    pub states: Option<Value>,
    pub modify: Option<Modify>,
    pub blacklist: bool,
}

/// Value modifiers of a leaf: one operation or an ordered chain of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Modify {
    Single(String),
    Chain(Vec<String>),
}

impl Modify {
    /// Iterates the non-blank operations in application order.
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        let ops: &[String] = match self {
            Self::Single(op) => std::slice::from_ref(op),
            Self::Chain(ops) => ops,
        };
        ops.iter().map(String::as_str).filter(|op| !op.trim().is_empty())
    }

    /// `true` when there is no operation at all (`""` or `[]`).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations().next().is_none()
    }
}

impl From<&str> for Modify {
    fn from(op: &str) -> Self {
        Self::Single(op.to_owned())
    }
}

impl<S: Into<String>> FromIterator<S> for Modify {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::Chain(iter.into_iter().map(Into::into).collect())
    }
}

/// Metadata actually intended for a leaf: an [`AttributeDefinition`] merged with defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedCommon {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub role: String,
    pub read: bool,
    pub write: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub states: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modify: Option<Modify>,
}
