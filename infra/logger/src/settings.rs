use serde::Deserialize;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;

/// Crates whose own logs stay at `warn` unless a filter says otherwise.
pub(crate) const QUIET_DEPENDENCIES: &[&str] = &["globset", "config"];

/// Logging section of the application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Compact human-readable output on stderr.
    pub console: bool,
    /// Directory for rolling log files. No file output when unset.
    pub directory: Option<PathBuf>,
    /// Write file output as JSON lines.
    pub json: bool,
    pub rotation: RotationPolicy,
    /// Rolled files kept on disk.
    pub max_files: usize,
    /// Extra directives such as `leafsync_engine=trace`. `RUST_LOG` is read when unset.
    pub filter: Option<String>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            console: true,
            directory: None,
            json: false,
            rotation: RotationPolicy::Daily,
            max_files: 7,
            filter: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

impl From<RotationPolicy> for Rotation {
    fn from(policy: RotationPolicy) -> Self {
        match policy {
            RotationPolicy::Minutely => Self::MINUTELY,
            RotationPolicy::Hourly => Self::HOURLY,
            RotationPolicy::Daily => Self::DAILY,
            RotationPolicy::Never => Self::NEVER,
        }
    }
}

/// Maps repeated `-q` / `-v` flags onto a level, starting from `info`.
///
/// Each `-v` lowers the threshold one step (`debug`, then `trace`), each `-q` raises it
/// (`warn`, `error`, then off). The two counts cancel each other out.
#[must_use]
pub fn verbosity(quiet: u8, verbose: u8) -> LevelFilter {
    match i16::from(verbose) - i16::from(quiet) {
        i16::MIN..=-3 => LevelFilter::OFF,
        -2 => LevelFilter::ERROR,
        -1 => LevelFilter::WARN,
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}
