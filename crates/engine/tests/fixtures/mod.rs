#![allow(dead_code)]

use leafsync_domain::EngineConfig;
use leafsync_engine::{
    AttributeCatalog, MemoryLedger, MemoryStore, Report, ReportLevel, ReportSink, SyncEngine,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Telemetry sink keeping every report for assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<Report>>,
}

impl ReportSink for RecordingSink {
    fn capture(&self, report: &Report) {
        self.reports.lock().push(report.clone());
    }
}

impl RecordingSink {
    #[must_use]
    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }

    #[must_use]
    pub fn at(&self, level: ReportLevel) -> Vec<Report> {
        self.reports.lock().iter().filter(|r| r.level == level).cloned().collect()
    }
}

#[derive(Debug)]
pub struct Harness {
    pub engine: SyncEngine<MemoryStore>,
    pub store: MemoryStore,
    pub ledger: Arc<MemoryLedger>,
    pub sink: Arc<RecordingSink>,
}

/// Engine over `store` with an in-memory ledger and a recording telemetry sink.
/// # Panics
/// * If the engine rejects `config`.
#[must_use]
pub fn harness_on(store: MemoryStore, catalog: AttributeCatalog, config: EngineConfig) -> Harness {
    let ledger = Arc::new(MemoryLedger::default());
    let sink = Arc::new(RecordingSink::default());
    let engine = SyncEngine::builder()
        .store(store.clone())
        .catalog(catalog)
        .config(config)
        .ledger(ledger.clone())
        .report_sink(sink.clone())
        .open()
        .expect("engine opens");
    Harness { engine, store, ledger, sink }
}

#[must_use]
pub fn harness_with(catalog: AttributeCatalog, config: EngineConfig) -> Harness {
    harness_on(MemoryStore::new(), catalog, config)
}

#[must_use]
pub fn harness() -> Harness {
    harness_with(AttributeCatalog::new(), EngineConfig::default())
}

/// # Panics
/// * If `value` is not a valid catalog document.
#[must_use]
pub fn catalog(value: Value) -> AttributeCatalog {
    AttributeCatalog::from_json(&value.to_string()).expect("valid catalog")
}

#[must_use]
pub fn with_interval(secs: u64) -> EngineConfig {
    EngineConfig { execution_interval_secs: Some(secs), ..EngineConfig::default() }
}
