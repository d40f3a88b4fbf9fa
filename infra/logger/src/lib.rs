//! # Logger
//!
//! Installs the global `tracing` subscriber used by the leafsync binaries.
//!
//! * A compact console layer on stderr, so stdout stays free for command output.
//! * An optional rolling file layer (text or JSON lines) written through a non-blocking worker.
//! * An env filter built from a base level (see [`verbosity`]), the configured directives
//!   and `RUST_LOG`. Chatty dependencies are held at `warn`.
//! * With the `opentelemetry` feature, a layer bridging spans to the global tracer.
//!
//! ## Example
//!
//! ```rust
//! use leafsync_logger::{LevelFilter, LogSettings, Logger};
//!
//! let _logger = Logger::builder()
//!     .name("leafsync")
//!     .settings(LogSettings::default())
//!     .level(LevelFilter::DEBUG)
//!     .init()
//!     .unwrap();
//! ```

mod error;
mod settings;

pub use crate::error::{LoggerError, LoggerErrorExt};
pub use crate::settings::{LogSettings, RotationPolicy, verbosity};
pub use tracing::level_filters::LevelFilter;

use crate::settings::QUIET_DEPENDENCIES;
use private::Sealed;
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const LOG_FILE_SUFFIX: &str = "log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug)]
pub struct Unnamed;
#[derive(Debug)]
pub struct Named(String);

mod private {
    pub trait Sealed {}
}
impl Sealed for Unnamed {}
impl Sealed for Named {}

/// Configures the global subscriber. A name is required before [`LoggerBuilder::init`].
#[derive(Debug)]
pub struct LoggerBuilder<N: Sealed = Unnamed> {
    settings: LogSettings,
    level: LevelFilter,
    name: N,
    #[cfg(feature = "opentelemetry")]
    opentelemetry: bool,
}

impl LoggerBuilder<Unnamed> {
    /// Names the application. The name prefixes rolled files (`leafsync.2026-01-01.log`).
    pub fn name(self, name: impl Into<String>) -> LoggerBuilder<Named> {
        LoggerBuilder {
            settings: self.settings,
            level: self.level,
            name: Named(name.into()),
            #[cfg(feature = "opentelemetry")]
            opentelemetry: self.opentelemetry,
        }
    }
}

impl<N: Sealed> LoggerBuilder<N> {
    /// Replaces every output setting at once, typically from the application config.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn settings(mut self, settings: LogSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Base level for every target without a more specific directive.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn console(mut self, enabled: bool) -> Self {
        self.settings.console = enabled;
        self
    }

    /// Writes rolling log files into `directory`.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn directory(mut self, directory: impl AsRef<Path>) -> Self {
        self.settings.directory = Some(directory.as_ref().to_path_buf());
        self
    }

    /// Extra filter directives, e.g. `leafsync_engine=trace`. Takes precedence over `RUST_LOG`.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn filter(mut self, directives: impl Into<String>) -> Self {
        self.settings.filter = Some(directives.into());
        self
    }

    /// Bridges spans to the global `OpenTelemetry` tracer. Install a provider before `init`.
    #[cfg(feature = "opentelemetry")]
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn opentelemetry(mut self, enabled: bool) -> Self {
        self.opentelemetry = enabled;
        self
    }
}

impl LoggerBuilder<Named> {
    /// Installs the global subscriber.
    ///
    /// Keep the returned [`Logger`] alive until shutdown: it owns the file writer's guard.
    ///
    /// # Errors
    /// * [`LoggerError::InvalidConfiguration`] for an empty name, a zero `max_files`, an
    ///   unparsable filter, or when no output is enabled.
    /// * [`LoggerError::Io`] when the log directory cannot be created.
    /// * [`LoggerError::Appender`] when the rolling appender cannot be set up.
    /// * [`LoggerError::Subscriber`] when a global subscriber is already installed.
    pub fn init(self) -> Result<Logger, LoggerError> {
        let name = self.name.0;
        validate(&name, &self.settings)?;
        let filter = env_filter(self.level, self.settings.filter.as_deref())?;

        let mut layers: Vec<BoxedLayer> = Vec::new();
        if self.settings.console {
            layers.push(layer().compact().with_writer(std::io::stderr).with_target(true).boxed());
        }

        #[cfg(feature = "opentelemetry")]
        if self.opentelemetry {
            let tracer = opentelemetry::global::tracer(name.clone());
            layers.push(tracing_opentelemetry::layer().with_tracer(tracer).boxed());
        }

        let guard = match &self.settings.directory {
            Some(directory) => {
                let (file_layer, guard) = file_layer(&name, directory, &self.settings)?;
                layers.push(file_layer);
                Some(guard)
            },
            None => None,
        };

        if layers.is_empty() {
            return Err(LoggerError::InvalidConfiguration {
                message: "no output enabled, turn on the console or set a log directory".into(),
                context: None,
            });
        }

        tracing_subscriber::registry().with(layers).with(filter).try_init()?;
        tracing::debug!(name = %name, file = guard.is_some(), "Logger initialized");

        Ok(Logger { name, guard })
    }
}

/// Handle to the installed subscriber. Dropping it flushes and stops the file writer.
#[must_use = "Dropping this handle stops the background log writer."]
#[derive(Debug)]
pub struct Logger {
    name: String,
    guard: Option<WorkerGuard>,
}

impl Logger {
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder {
            settings: LogSettings::default(),
            level: LevelFilter::INFO,
            name: Unnamed,
            #[cfg(feature = "opentelemetry")]
            opentelemetry: false,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` when a file layer is installed.
    #[must_use]
    pub const fn writes_files(&self) -> bool {
        self.guard.is_some()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.guard.is_some() {
            tracing::debug!(name = %self.name, "Flushing log files");
        }
    }
}

fn validate(name: &str, settings: &LogSettings) -> Result<(), LoggerError> {
    if name.trim().is_empty() {
        return Err(LoggerError::InvalidConfiguration { message: "name cannot be empty".into(), context: None });
    }
    if settings.directory.is_some() && settings.max_files == 0 {
        return Err(LoggerError::InvalidConfiguration {
            message: "max_files must be greater than zero".into(),
            context: None,
        });
    }
    Ok(())
}

/// Base level, then dependency caps, then explicit directives (or `RUST_LOG`) on top.
fn env_filter(level: LevelFilter, directives: Option<&str>) -> Result<EnvFilter, LoggerError> {
    let mut filter = match directives {
        Some(directives) => EnvFilter::builder().with_default_directive(level.into()).parse(directives).map_err(
            |e| LoggerError::InvalidConfiguration {
                message: format!("invalid filter '{directives}': {e}").into(),
                context: None,
            },
        )?,
        None => EnvFilter::builder().with_default_directive(level.into()).from_env_lossy(),
    };
    let explicit = directives.map(str::to_owned).or_else(|| std::env::var(EnvFilter::DEFAULT_ENV).ok());
    for dependency in QUIET_DEPENDENCIES {
        if explicit.as_deref().is_some_and(|d| d.contains(dependency)) {
            continue;
        }
        let directive = format!("{dependency}=warn").parse::<Directive>().map_err(|e| LoggerError::Internal {
            message: e.to_string().into(),
            context: Some("Building dependency directive".into()),
        })?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

fn file_layer(name: &str, directory: &Path, settings: &LogSettings) -> Result<(BoxedLayer, WorkerGuard), LoggerError> {
    fs::create_dir_all(directory).context(format!("Creating {}", directory.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(settings.rotation.into())
        .filename_prefix(name)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(settings.max_files)
        .build(directory)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = layer().with_writer(writer).with_ansi(false);
    let boxed = if settings.json { layer.json().boxed() } else { layer.boxed() };
    Ok((boxed, guard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn builder_starts_with_console_at_info() {
        let builder = Logger::builder().name("leafsync-test");
        assert!(builder.settings.console);
        assert!(builder.settings.directory.is_none());
        assert_eq!(builder.level, LevelFilter::INFO);
    }

    #[test]
    fn settings_then_overrides() {
        let builder = Logger::builder()
            .settings(LogSettings { json: true, max_files: 3, ..LogSettings::default() })
            .name("leafsync-test")
            .console(false)
            .directory("logs")
            .filter("leafsync_engine=trace");

        assert!(!builder.settings.console);
        assert!(builder.settings.json);
        assert_eq!(builder.settings.max_files, 3);
        assert_eq!(builder.settings.directory.as_deref(), Some(Path::new("logs")));
        assert_eq!(builder.settings.filter.as_deref(), Some("leafsync_engine=trace"));
    }

    #[test]
    fn rejects_blank_name_and_zero_retention() {
        let settings = LogSettings::default();
        assert!(matches!(validate(" ", &settings), Err(LoggerError::InvalidConfiguration { .. })));

        let settings = LogSettings { directory: Some("logs".into()), max_files: 0, ..LogSettings::default() };
        assert!(matches!(validate("leafsync", &settings), Err(LoggerError::InvalidConfiguration { .. })));
    }

    #[test]
    #[serial]
    fn explicit_filter_is_parsed() {
        let filter = env_filter(LevelFilter::WARN, Some("leafsync_engine=trace")).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("leafsync_engine=trace"));
        assert!(rendered.contains("globset=warn"));

        let err = env_filter(LevelFilter::INFO, Some("leafsync_engine=loud")).unwrap_err();
        assert_eq!(err.kind(), "invalid_configuration");
    }

    #[test]
    #[serial]
    fn explicit_dependency_directive_is_not_capped() {
        let filter = env_filter(LevelFilter::INFO, Some("globset=debug")).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("globset=debug"));
        assert!(!rendered.contains("globset=warn"));
        assert!(rendered.contains("config=warn"));
    }

    #[test]
    #[serial]
    fn no_output_is_rejected() {
        let err = Logger::builder().name("leafsync-test").console(false).init().unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }
}
