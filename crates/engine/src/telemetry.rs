//! Forwarding of warnings and errors to an external crash/telemetry collector.

use std::fmt;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportLevel {
    Info,
    Warning,
    Error,
}

/// One telemetry event with a free-form message and string tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub level: ReportLevel,
    pub message: String,
    pub tags: Vec<(&'static str, String)>,
}

impl Report {
    #[must_use]
    pub fn new(level: ReportLevel, message: impl Into<String>) -> Self {
        Self { level, message: message.into(), tags: Vec::new() }
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ReportLevel::Info, message)
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(ReportLevel::Warning, message)
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ReportLevel::Error, message)
    }

    #[must_use]
    pub fn tag(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.tags.push((key, value.into()));
        self
    }

    #[must_use]
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }
}

/// Receiver of telemetry reports.
///
/// Implementations must not block; the engine calls `capture` from inside leaf tasks.
pub trait ReportSink: Send + Sync + fmt::Debug {
    fn capture(&self, report: &Report);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl ReportSink for DiscardSink {
    fn capture(&self, _report: &Report) {}
}

/// Gate in front of a [`ReportSink`].
///
/// Reports are dropped when telemetry is disabled or when debug/trace logging is active,
/// so development sessions never reach the collector.
#[derive(Debug, Clone)]
pub struct Telemetry {
    sink: Arc<dyn ReportSink>,
    enabled: bool,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(Arc::new(DiscardSink), false)
    }
}

impl Telemetry {
    #[must_use]
    pub fn new(sink: Arc<dyn ReportSink>, enabled: bool) -> Self {
        Self { sink, enabled }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn report(&self, report: Report) {
        if !self.enabled {
            return;
        }
        if LevelFilter::current() >= LevelFilter::DEBUG {
            debug!(message = %report.message, "Telemetry suppressed while debug logging is active");
            return;
        }
        match report.level {
            ReportLevel::Info => info!(message = %report.message, "Info message reported"),
            ReportLevel::Warning => info!(message = %report.message, "Warning reported"),
            ReportLevel::Error => info!(message = %report.message, "Error reported"),
        }
        self.sink.capture(&report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct Collect(Mutex<Vec<Report>>);

    impl ReportSink for Collect {
        fn capture(&self, report: &Report) {
            self.0.lock().push(report.clone());
        }
    }

    #[test]
    fn disabled_gate_drops_reports() {
        let sink = Arc::new(Collect::default());
        Telemetry::new(sink.clone(), false).report(Report::error("boom"));
        assert!(sink.0.lock().is_empty());
    }

    #[test]
    fn enabled_gate_forwards_tags() {
        let sink = Arc::new(Collect::default());
        Telemetry::new(sink.clone(), true)
            .report(Report::warning("missing").tag("missing_attribute", "voltage"));
        let reports = sink.0.lock();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].tag_value("missing_attribute"), Some("voltage"));
    }
}
