//! Recursive flattening of arbitrary JSON into containers and leaves.

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncErrorExt};
use crate::store::StateStore;
use crate::telemetry::Report;
use leafsync_domain::ContainerKind;
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use tokio::task::JoinSet;
use tracing::{debug, error, trace};

/// Per-call flattening flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraverseOptions {
    /// Label containers with their `name` property, falling back to the stored label.
    pub replace_name: bool,
    /// Address child objects by their `id` property instead of their key or index.
    pub replace_id: bool,
}

/// How a value is laid out in the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Non-empty object: becomes a container.
    Container(Map<String, Value>),
    /// Array holding at least one object or array: those become indexed containers.
    ObjectArray(Vec<Value>),
    /// Array of scalars only: one leaf holding the array as JSON text.
    PrimitiveArray(String),
    /// Anything else, null included: one leaf.
    Scalar(Value),
    /// `{}` or `[]`: nothing is written.
    Empty,
}

impl Shape {
    #[must_use]
    pub fn classify(value: Value) -> Self {
        match value {
            Value::Object(map) if map.is_empty() => Self::Empty,
            Value::Object(map) => Self::Container(map),
            Value::Array(items) if items.is_empty() => Self::Empty,
            Value::Array(items) if items.iter().any(|v| v.is_object() || v.is_array()) => Self::ObjectArray(items),
            array @ Value::Array(_) => Self::PrimitiveArray(array.to_string()),
            scalar => Self::Scalar(scalar),
        }
    }
}

type Branch = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

impl<S: StateStore> SyncEngine<S> {
    /// Flattens `value` below `parent` starting at depth 0 (device level).
    ///
    /// Returns once every container and leaf it dispatched has been processed. Failures
    /// are contained per branch: they are logged and reported, and siblings carry on.
    pub async fn flatten(&self, value: Value, parent: Option<&str>, options: TraverseOptions) {
        self.flatten_at(value, parent, options, 0).await;
    }

    /// Like [`SyncEngine::flatten`] with an explicit starting depth, which fixes the kind
    /// of the container created at `parent`.
    pub async fn flatten_at(&self, value: Value, parent: Option<&str>, options: TraverseOptions, depth: usize) {
        self.traverse(value, parent.map(str::to_owned), options, depth).await;
    }

    fn traverse(&self, value: Value, parent: Option<String>, options: TraverseOptions, depth: usize) -> Branch {
        let engine = self.clone();
        Box::pin(async move {
            if let Err(err) = engine.try_traverse(value, parent.as_deref(), options, depth).await {
                let parent = parent.as_deref().unwrap_or_default();
                error!(parent, error = %err, "Error in function traverse");
                engine.telemetry.report(
                    Report::error(format!("Failed to traverse '{parent}': {err}"))
                        .tag("kind", err.kind())
                        .tag("path", parent),
                );
            }
        })
    }

    async fn try_traverse(
        &self,
        value: Value,
        parent: Option<&str>,
        options: TraverseOptions,
        depth: usize,
    ) -> Result<(), SyncError> {
        let parent = match parent {
            Some(raw) => {
                let path = self.sanitizer.sanitize(raw).into_owned();
                let label = self.container_label(&value, &path, options).await?;
                let kind = ContainerKind::for_depth(depth);
                self.store
                    .create_or_update_container(&path, kind, &label)
                    .await
                    .context(format!("Creating {kind} {path}"))?;
                trace!(path = %path, %kind, label = %label, "Container written");
                Some(path)
            },
            None => None,
        };

        let mut branches = JoinSet::new();
        for (key, child) in entries(value) {
            self.dispatch(&mut branches, parent.as_deref(), key, child, options, depth);
        }
        while let Some(joined) = branches.join_next().await {
            if let Err(err) = joined {
                error!(parent = ?parent, error = %err, "Traversal branch aborted");
                self.telemetry.report(Report::error(format!("Traversal branch aborted: {err}")));
            }
        }
        Ok(())
    }

    async fn container_label(&self, value: &Value, path: &str, options: TraverseOptions) -> Result<String, SyncError> {
        if !options.replace_name {
            return Ok(String::new());
        }
        if let Some(name) = value.get("name").and_then(segment_text) {
            return Ok(name);
        }
        let stored = self.store.container_label(path).await.context(format!("Reading label of {path}"))?;
        Ok(stored.unwrap_or_default())
    }

    fn dispatch(
        &self,
        branches: &mut JoinSet<()>,
        parent: Option<&str>,
        key: String,
        child: Value,
        options: TraverseOptions,
        depth: usize,
    ) {
        match Shape::classify(child) {
            Shape::Empty => trace!(key, "Empty value elided"),
            Shape::Container(map) => {
                let segment = child_segment(&map, options).unwrap_or(key);
                let path = self.sanitizer.join(parent, &segment);
                branches.spawn(self.traverse(Value::Object(map), Some(path), options, depth + 1));
            },
            Shape::ObjectArray(items) => {
                let array_path = self.sanitizer.join(parent, &key);
                for (index, item) in items.into_iter().enumerate() {
                    let index = index.to_string();
                    match item {
                        Value::Object(map) if map.is_empty() => {},
                        Value::Array(nested) if nested.is_empty() => {},
                        Value::Object(map) => {
                            let segment = child_segment(&map, options).unwrap_or(index);
                            let path = self.sanitizer.join(Some(&array_path), &segment);
                            branches.spawn(self.traverse(Value::Object(map), Some(path), options, depth + 1));
                        },
                        Value::Array(nested) => {
                            let path = self.sanitizer.join(Some(&array_path), &index);
                            branches.spawn(self.traverse(Value::Array(nested), Some(path), options, depth + 1));
                        },
                        value => self.spawn_leaf(branches, Some(&array_path), index, value),
                    }
                }
            },
            Shape::PrimitiveArray(text) => self.spawn_leaf(branches, parent, key, Value::String(text)),
            Shape::Scalar(value) => self.spawn_leaf(branches, parent, key, value),
        }
    }

    fn spawn_leaf(&self, branches: &mut JoinSet<()>, parent: Option<&str>, name: String, value: Value) {
        let path = self.sanitizer.join(parent, &name);
        let engine = self.clone();
        branches.spawn(async move { engine.synchronize(&path, &name, Some(value)).await });
    }
}

/// Keyed children of the top-level value. Arrays yield their indices as keys.
fn entries(value: Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items.into_iter().enumerate().map(|(i, v)| (i.to_string(), v)).collect(),
        scalar => {
            debug!(value = %scalar, "Nothing to flatten below a scalar");
            Vec::new()
        },
    }
}

/// The `id` of a child object when ids replace keys.
fn child_segment(map: &Map<String, Value>, options: TraverseOptions) -> Option<String> {
    if !options.replace_id {
        return None;
    }
    map.get("id").and_then(segment_text)
}

fn segment_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
