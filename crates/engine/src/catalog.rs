//! Static attribute definitions, keyed by leaf name.

use crate::error::{CatalogError, CatalogErrorExt};
use fxhash::FxHashMap;
use leafsync_domain::AttributeDefinition;
use std::path::Path;
use tracing::info;

/// Read-only table of [`AttributeDefinition`]s, loaded once and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct AttributeCatalog {
    definitions: FxHashMap<String, AttributeDefinition>,
}

impl AttributeCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON object of `name -> definition`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] when the text is not such an object.
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let definitions: FxHashMap<String, AttributeDefinition> =
            serde_json::from_str(text).context("Attribute catalog must map names to definitions")?;
        Ok(Self { definitions })
    }

    /// Reads and parses a catalog file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] when the file cannot be read and
    /// [`CatalogError::Parse`] when its content is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .context(format!("Failed to read attribute catalog: {}", path.display()))?;
        let catalog = Self::from_json(&text)?;
        info!(path = %path.display(), definitions = catalog.len(), "Attribute catalog loaded");
        Ok(catalog)
    }

    /// Adds or replaces one definition.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, definition: AttributeDefinition) -> Self {
        self.definitions.insert(name.into(), definition);
        self
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&AttributeDefinition> {
        self.definitions.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Defined leaf names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }
}

impl FromIterator<(String, AttributeDefinition)> for AttributeCatalog {
    fn from_iter<I: IntoIterator<Item = (String, AttributeDefinition)>>(iter: I) -> Self {
        Self { definitions: iter.into_iter().collect() }
    }
}
