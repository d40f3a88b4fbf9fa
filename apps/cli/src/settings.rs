//! Layered application configuration.

use config::{Config, Environment, File};
use leafsync_domain::EngineConfig;
use leafsync_logger::LogSettings;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix of environment overrides, e.g. `LEAFSYNC__ENGINE__EXECUTION_INTERVAL_SECS=30`.
pub const ENV_PREFIX: &str = "LEAFSYNC";
/// Base name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG: &str = "leafsync";

#[leafsync_derive::leafsync_error]
pub enum SettingsError {
    #[error("Configuration error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub log: LogSettings,
    /// Attribute catalog (JSON object of name -> definition).
    pub catalog: Option<PathBuf>,
}

/// Loads `T` from a configuration file overlaid with `LEAFSYNC__*` environment variables.
///
/// An explicit `path` must exist. Without one, `leafsync.{toml,json,yaml}` in the working
/// directory is used when present and defaults apply otherwise.
///
/// # Errors
/// Returns [`SettingsError::Config`] when the file is missing or malformed, or when the
/// merged values do not fit `T`.
pub fn load_config<T: DeserializeOwned>(path: Option<&Path>) -> Result<T, SettingsError> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_CONFIG).required(false),
    };

    let config = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .convert_case(config::Case::Snake)
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;
    debug!(file = ?path, "Configuration loaded");

    config.try_deserialize::<T>().context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn file_values_fill_nested_sections() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "catalog = \"defs.json\"\n[engine]\nexecution_interval_secs = 30\nliveness_key = \"alive\"\n[log]\njson = true"
        )
        .unwrap();

        let config: AppConfig = load_config(Some(file.path())).unwrap();

        assert_eq!(config.engine.execution_interval_secs, Some(30));
        assert_eq!(config.engine.liveness_key, "alive");
        assert_eq!(config.engine.settle_delay_ms, EngineConfig::default().settle_delay_ms);
        assert!(config.log.json);
        assert_eq!(config.catalog, Some(PathBuf::from("defs.json")));
    }

    #[test]
    #[serial]
    fn missing_explicit_file_is_an_error() {
        let err = load_config::<AppConfig>(Some(Path::new("/nonexistent/leafsync.toml"))).unwrap_err();
        assert_eq!(err.kind(), "config");
    }
}
