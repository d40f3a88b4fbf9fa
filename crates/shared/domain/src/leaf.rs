use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of a non-terminal node, derived from its depth in the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    Device,
    Channel,
    Folder,
}

impl ContainerKind {
    /// 0 -> device, 1 -> channel, anything deeper -> folder.
    #[must_use]
    pub const fn for_depth(depth: usize) -> Self {
        match depth {
            0 => Self::Device,
            1 => Self::Channel,
            _ => Self::Folder,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Device => "device",
            Self::Channel => "channel",
            Self::Folder => "folder",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value write addressed to a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafWrite {
    pub value: Value,
    /// `true` for writes coming from the data source, `false` for external commands.
    pub acknowledged: bool,
}

impl LeafWrite {
    #[must_use]
    pub const fn acknowledged(value: Value) -> Self {
        Self { value, acknowledged: true }
    }
}

/// The current value of a leaf as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafState {
    pub value: Value,
    pub acknowledged: bool,
    /// Last write, in milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl LeafState {
    /// JavaScript-style truthiness of the stored value.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match &self.value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }
}
