//! Per-leaf synchronization: metadata resolution and diffing, value modifiers,
//! liveness timers and subscriptions.

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncErrorExt};
use crate::ledger::Recorded;
use crate::modifier;
use crate::store::StateStore;
use crate::telemetry::Report;
use leafsync_domain::constants::{DEFAULT_ROLE, MIXED_TYPE};
use leafsync_domain::{AttributeDefinition, LeafWrite, ResolvedCommon};
use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// What one successful synchronization did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafOutcome {
    /// The name is blacklisted; the store was not touched.
    Blacklisted,
    Synced {
        /// Sanitized path the leaf was written to.
        path: String,
        metadata_written: bool,
        value_written: bool,
        newly_subscribed: bool,
    },
}

static EMPTY_DEFINITION: AttributeDefinition = AttributeDefinition {
    name: None,
    value_type: None,
    read: None,
    write: None,
    role: None,
    unit: None,
    states: None,
    modify: None,
    blacklist: false,
};

impl<S: StateStore> SyncEngine<S> {
    /// Synchronizes one leaf and never fails.
    ///
    /// Errors are logged with path, name and value, reported to telemetry, and swallowed,
    /// so one bad leaf cannot take its siblings down.
    pub async fn synchronize(&self, path: &str, name: &str, value: Option<Value>) {
        let shown = value.clone();
        if let Err(err) = self.try_synchronize(path, name, value).await {
            let shown = shown.as_ref().map_or(Cow::Borrowed("undefined"), |v| Cow::Owned(v.to_string()));
            error!(path, name, value = %shown, error = %err, "Error in function synchronize");
            self.telemetry.report(
                Report::error(format!("Failed to synchronize '{name}' at '{path}': {err}"))
                    .tag("kind", err.kind())
                    .tag("path", path),
            );
        }
    }

    /// Synchronizes one leaf and returns what happened.
    ///
    /// 1. Resolves the attribute definition for `name`, warning once per unknown name.
    /// 2. Returns early for blacklisted names.
    /// 3. Sanitizes `path` and resolves its metadata.
    /// 4. Writes metadata only when it differs from the last applied one.
    /// 5. Writes the modified value, if one was given.
    /// 6. Re-arms the expiry timer for the liveness leaf and subscribes writable leaves once.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] when a store call fails. Later steps are skipped.
    pub async fn try_synchronize(
        &self,
        path: &str,
        name: &str,
        value: Option<Value>,
    ) -> Result<LeafOutcome, SyncError> {
        let definition = self.catalog.lookup(name);
        if definition.is_none() {
            self.warn_missing_definition(name, value.as_ref()).await;
        }
        if definition.is_some_and(|d| d.blacklist) {
            trace!(name, "Name is on the blacklist, skipping");
            return Ok(LeafOutcome::Blacklisted);
        }

        let path = self.sanitize_leaf_path(path);
        let common = resolve(name, definition.unwrap_or(&EMPTY_DEFINITION), value.as_ref());

        let prior = match self.cache.get(&path) {
            Some(cached) => Some(cached),
            None => self.store.leaf_metadata(&path).await.context("Reading existing leaf metadata")?,
        };
        let metadata_written = needs_update(&common, prior.as_ref());
        if metadata_written {
            self.store
                .write_leaf_metadata(&path, &common)
                .await
                .context(format!("Writing metadata of {path}"))?;
            debug!(path = %path, "Leaf metadata written");
        }

        let writable = common.write;
        let modify = common.modify.clone();
        self.cache.insert(path.clone(), common);

        let value_written = match value {
            Some(value) => {
                let value = modifier::apply(modify.as_ref(), value, &self.telemetry);
                self.store
                    .write_leaf_value(&path, LeafWrite::acknowledged(value))
                    .await
                    .context(format!("Writing value of {path}"))?;
                true
            },
            None => false,
        };

        if name == self.config.liveness_key
            && let Some(window) = self.config.expiry_window()
        {
            self.arm_expiry(&path, window);
        }

        let newly_subscribed = writable && self.subscribe_once(&path).await?;

        Ok(LeafOutcome::Synced { path, metadata_written, value_written, newly_subscribed })
    }

    fn sanitize_leaf_path(&self, raw: &str) -> String {
        let sanitized = self.sanitizer.sanitize(raw);
        if let Cow::Owned(_) = &sanitized {
            info!(original = raw, sanitized = %sanitized, "Object name was sanitized");
        }
        sanitized.into_owned()
    }

    async fn warn_missing_definition(&self, name: &str, value: Option<&Value>) {
        let message = format!(
            "State attribute definition missing for '{name}' with value '{}' (type: {})",
            value.map_or(Cow::Borrowed("undefined"), |v| Cow::Owned(v.to_string())),
            runtime_type(value),
        );
        match self.ledger.record(name, message.clone()).await {
            Ok(Recorded::Known) => return,
            Ok(Recorded::New) => {},
            Err(err) => {
                error!(name, error = %err, "Failed to save warn ledger");
                self.telemetry.report(Report::error(err.to_string()).tag("kind", err.kind()));
            },
        }
        warn!(name, "{message}");
        self.telemetry.report(Report::warning(message).tag("missing_attribute", name));
    }

    /// Subscribes `path` unless an earlier call already did. A refused subscription is
    /// released again so the next synchronization retries it.
    async fn subscribe_once(&self, path: &str) -> Result<bool, SyncError> {
        if !self.subscriptions.claim(path) {
            return Ok(false);
        }
        if let Err(err) = self.store.subscribe(path).await {
            self.subscriptions.release(path);
            return Err(err).context(format!("Subscribing {path}"));
        }
        debug!(path, "Subscribed to leaf changes");
        Ok(true)
    }

    /// Arms (or re-arms) the timer that writes `false` to the liveness leaf once it has not
    /// been refreshed for `window`.
    pub(crate) fn arm_expiry(&self, path: &str, window: Duration) {
        let weak = Arc::downgrade(&self.inner);
        let owned = path.to_owned();
        self.timers.arm(path, move |id| {
            tokio::spawn(async move {
                tokio::time::sleep(window).await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let engine = Self { inner };
                if engine.timers.finish(&owned, id) {
                    engine.expire(&owned).await;
                }
            })
            .abort_handle()
        });
        trace!(path, ?window, "Expiry timer armed");
    }

    async fn expire(&self, path: &str) {
        match self.store.write_leaf_value(path, LeafWrite::acknowledged(Value::Bool(false))).await {
            Ok(()) => debug!(path, "Liveness leaf expired, marked offline"),
            Err(err) => {
                error!(path, error = %err, "Failed to expire liveness leaf");
                self.telemetry.report(Report::error(err.to_string()).tag("kind", err.kind()).tag("path", path));
            },
        }
    }
}

/// Merges `definition` with the defaults for a leaf called `name` holding `value`.
#[must_use]
pub fn resolve(name: &str, definition: &AttributeDefinition, value: Option<&Value>) -> ResolvedCommon {
    ResolvedCommon {
        name: definition.name.clone().filter(|n| !n.is_empty()).unwrap_or_else(|| name.to_owned()),
        value_type: definition
            .value_type
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| runtime_type(value).to_owned()),
        role: definition.role.clone().filter(|r| !r.is_empty()).unwrap_or_else(|| DEFAULT_ROLE.to_owned()),
        read: definition.read.unwrap_or(true),
        write: definition.write.unwrap_or(false),
        unit: definition.unit.clone(),
        states: definition.states.clone(),
        modify: definition.modify.clone().filter(|m| !m.is_empty()),
    }
}

/// Store type name for the runtime type of `value`.
#[must_use]
pub fn runtime_type(value: Option<&Value>) -> &'static str {
    match value {
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
        Some(Value::Null) | None => MIXED_TYPE,
    }
}

/// `true` when `prior` is absent or differs from `new` in any field the store keeps.
///
/// `unit` compares with absent as empty text; `states` and `modify` compare by their
/// canonical JSON serialization.
#[must_use]
pub fn needs_update(new: &ResolvedCommon, prior: Option<&ResolvedCommon>) -> bool {
    let Some(prior) = prior else {
        return true;
    };
    new.name != prior.name
        || new.value_type != prior.value_type
        || new.role != prior.role
        || new.read != prior.read
        || new.write != prior.write
        || new.unit.as_deref().unwrap_or_default() != prior.unit.as_deref().unwrap_or_default()
        || canonical(&new.states) != canonical(&prior.states)
        || canonical(&new.modify) != canonical(&prior.modify)
}

/// JSON text with object keys sorted at every level, independent of insertion order.
fn canonical<T: Serialize>(value: &Option<T>) -> String {
    let mut out = String::new();
    if let Ok(value) = serde_json::to_value(value) {
        write_canonical(&value, &mut out);
    }
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        },
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        },
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leafsync_domain::Modify;
    use serde_json::json;

    #[test]
    fn defaults_follow_runtime_type() {
        let common = resolve("temp", &EMPTY_DEFINITION, Some(&json!(21.5)));
        assert_eq!(common.name, "temp");
        assert_eq!(common.value_type, "number");
        assert_eq!(common.role, "state");
        assert!(common.read);
        assert!(!common.write);
        assert_eq!(resolve("x", &EMPTY_DEFINITION, None).value_type, "mixed");
        assert_eq!(resolve("x", &EMPTY_DEFINITION, Some(&Value::Null)).value_type, "mixed");
        assert_eq!(resolve("x", &EMPTY_DEFINITION, Some(&json!("on"))).value_type, "string");
    }

    #[test]
    fn definition_overrides_defaults() {
        let definition = AttributeDefinition {
            name: Some("Temperature".into()),
            value_type: Some("number".into()),
            role: Some("value.temperature".into()),
            write: Some(true),
            unit: Some("°C".into()),
            modify: Some(Modify::from("")),
            ..AttributeDefinition::default()
        };
        let common = resolve("temp", &definition, Some(&json!("21")));
        assert_eq!(common.name, "Temperature");
        assert_eq!(common.value_type, "number");
        assert!(common.write);
        assert_eq!(common.modify, None);
    }

    #[test]
    fn blank_name_type_and_role_fall_back() {
        let definition = AttributeDefinition {
            name: Some(String::new()),
            value_type: Some(String::new()),
            role: Some(String::new()),
            ..AttributeDefinition::default()
        };
        let common = resolve("x", &definition, Some(&json!(true)));
        assert_eq!(common.name, "x");
        assert_eq!(common.value_type, "boolean");
        assert_eq!(common.role, "state");
    }

    #[test]
    fn unchanged_metadata_needs_no_update() {
        let a = resolve("temp", &EMPTY_DEFINITION, Some(&json!(1)));
        assert!(needs_update(&a, None));
        assert!(!needs_update(&a, Some(&a.clone())));

        let mut unit_empty = a.clone();
        unit_empty.unit = Some(String::new());
        assert!(!needs_update(&unit_empty, Some(&a)));

        let mut states = a.clone();
        states.states = Some(json!({ "0": "off", "1": "on" }));
        assert!(needs_update(&states, Some(&a)));
        let mut reordered = a.clone();
        reordered.states = Some(json!({ "1": "on", "0": "off" }));
        assert!(!needs_update(&states, Some(&reordered)));

        let mut modify = a.clone();
        modify.modify = Some(Modify::from("round(1)"));
        assert!(needs_update(&modify, Some(&a)));
    }
}
