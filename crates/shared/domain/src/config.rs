use crate::constants::LIVENESS_KEY;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime knobs of one synchronization engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Polling interval of the data source in seconds. Enables the liveness expiry timer.
    pub execution_interval_secs: Option<u64>,
    /// Grace added on top of one polling interval before the liveness leaf expires.
    pub expiry_grace_ms: u64,
    /// Pause before a sweep enumerates leaves, so in-flight writes of the same cycle land.
    pub settle_delay_ms: u64,
    /// Minimum age of the liveness leaf before `mark_online` rewrites it.
    pub online_refresh_secs: u64,
    /// Reserved leaf name that anchors liveness.
    pub liveness_key: String,
    /// Forward warnings and errors to the telemetry sink.
    pub telemetry_enabled: bool,
    /// Location of the persisted warn ledger.
    pub ledger_path: PathBuf,
}

impl EngineConfig {
    /// Delay after which an unrefreshed liveness leaf is written `false`.
    #[must_use]
    pub fn expiry_window(&self) -> Option<Duration> {
        self.execution_interval_secs.map(|secs| {
            Duration::from_millis(secs.saturating_mul(1000).saturating_add(self.expiry_grace_ms))
        })
    }

    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[must_use]
    pub const fn online_refresh(&self) -> Duration {
        Duration::from_secs(self.online_refresh_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            execution_interval_secs: None,
            expiry_grace_ms: 5000,
            settle_delay_ms: 1000,
            online_refresh_secs: 10,
            liveness_key: LIVENESS_KEY.to_owned(),
            telemetry_enabled: true,
            ledger_path: PathBuf::from("warn_messages.json"),
        }
    }
}
