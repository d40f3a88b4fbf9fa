//! Subcommand handlers. Each returns the JSON document the binary prints.

use crate::args::SyncArgs;
use crate::settings::AppConfig;
use anyhow::{Context, Result};
use leafsync_engine::{AttributeCatalog, MemoryStore, SweepOutcome, SyncEngine, TraverseOptions};
use serde_json::{Value, json};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// Flattens the input document into a fresh [`MemoryStore`] and returns the resulting tree.
///
/// # Errors
/// Fails when the catalog or input cannot be read, the engine rejects the configuration,
/// or a liveness or ledger write fails. Per-leaf failures are logged and do not abort.
pub async fn sync(config: &AppConfig, args: &SyncArgs) -> Result<Value> {
    let catalog = load_catalog(config.catalog.as_deref())?;
    let document = read_document(&args.input)?;

    let engine = SyncEngine::builder()
        .store(MemoryStore::new())
        .catalog(catalog)
        .config(config.engine.clone())
        .open()
        .context("Failed to open sync engine")?;

    if args.announce {
        engine.announce_version(env!("CARGO_PKG_VERSION")).await.context("Failed to record version")?;
    }
    if args.online {
        engine.mark_online().await.context("Failed to mark source online")?;
    }

    let options = TraverseOptions { replace_name: args.replace_name, replace_id: args.replace_id };
    engine.flatten(document, args.parent.as_deref(), options).await;

    if let Some(pattern) = &args.sweep {
        match engine.sweep(pattern).await {
            SweepOutcome::Completed { nulled } => info!(pattern, nulled = nulled.len(), "Sweep completed"),
            SweepOutcome::Aborted => warn!(pattern, "Sweep aborted, pass --online to mark the source live"),
        }
    }

    let tree = engine.store().snapshot();
    engine.close();
    Ok(tree)
}

/// Parses a catalog and lists its names.
///
/// # Errors
/// Fails when no catalog is configured or the file is not a valid catalog.
pub fn catalog(config: &AppConfig, path: Option<&Path>) -> Result<Value> {
    let path = path.or(config.catalog.as_deref()).context("No catalog given and none configured")?;
    let catalog = AttributeCatalog::load(path)?;

    let mut names: Vec<&str> = catalog.names().collect();
    names.sort_unstable();
    Ok(json!({ "path": path.display().to_string(), "definitions": names.len(), "names": names }))
}

fn load_catalog(path: Option<&Path>) -> Result<AttributeCatalog> {
    let Some(path) = path else {
        warn!("No attribute catalog configured, every leaf falls back to defaults");
        return Ok(AttributeCatalog::new());
    };
    Ok(AttributeCatalog::load(path)?)
}

fn read_document(input: &Path) -> Result<Value> {
    let text = if input == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text).context("Failed to read stdin")?;
        text
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))?
    };
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", input.display()))
}
