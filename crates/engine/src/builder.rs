use crate::cache::DefinitionCache;
use crate::catalog::AttributeCatalog;
use crate::engine::{EngineInner, SyncEngine};
use crate::error::EngineError;
use crate::ledger::{FileLedger, LedgerBackend, WarnLedger};
use crate::sanitize::Sanitizer;
use crate::store::StateStore;
use crate::subscriptions::SubscriptionSet;
use crate::telemetry::{DiscardSink, ReportSink, Telemetry};
use crate::timers::ExpiryTimers;
use leafsync_domain::EngineConfig;
use private::Sealed;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default)]
struct EngineOptions {
    catalog: AttributeCatalog,
    config: EngineConfig,
    ledger: Option<Box<dyn LedgerBackend>>,
    sink: Option<Arc<dyn ReportSink>>,
    forbidden: Option<Vec<char>>,
}

#[derive(Debug, Default)]
pub struct NoStore;
#[derive(Debug)]
pub struct WithStore<S>(S);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoStore {}
impl<S: StateStore> Sealed for WithStore<S> {}

/// Typestate builder for [`SyncEngine`]; `open` only exists once a store is set.
#[allow(private_bounds)]
#[derive(Debug, Default)]
pub struct EngineBuilder<St: Sealed = NoStore> {
    state: St,
    options: EngineOptions,
}

#[allow(private_bounds)]
impl<St: Sealed> EngineBuilder<St> {
    #[must_use = "Sets the attribute definitions used to resolve leaf metadata"]
    pub fn catalog(mut self, catalog: AttributeCatalog) -> Self {
        self.options.catalog = catalog;
        self
    }

    #[must_use = "Sets the engine configuration"]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.options.config = config;
        self
    }

    /// Overrides the warn ledger backend. Defaults to a [`FileLedger`] at
    /// [`EngineConfig::ledger_path`].
    #[must_use = "Sets where the warn ledger is persisted"]
    pub fn ledger(mut self, backend: impl LedgerBackend + 'static) -> Self {
        self.options.ledger = Some(Box::new(backend));
        self
    }

    #[must_use = "Sets the telemetry sink"]
    pub fn report_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.options.sink = Some(sink);
        self
    }

    /// Overrides the forbidden character set the store advertises.
    #[must_use = "Sets the characters replaced in generated paths"]
    pub fn forbidden_chars(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        self.options.forbidden = Some(chars.into_iter().collect());
        self
    }

    fn transition<N: Sealed>(self, state: N) -> EngineBuilder<N> {
        EngineBuilder { state, options: self.options }
    }
}

impl EngineBuilder<NoStore> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "Sets the state store the engine writes into"]
    pub fn store<S: StateStore>(self, store: S) -> EngineBuilder<WithStore<S>> {
        self.transition(WithStore(store))
    }
}

impl<S: StateStore> EngineBuilder<WithStore<S>> {
    /// Validates the configuration, loads the warn ledger and returns a ready engine.
    ///
    /// An unreadable ledger is not fatal: it is logged and the engine starts with an
    /// empty one.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] when the liveness key is empty or contains
    /// a path separator, or when the execution interval is zero.
    pub fn open(self) -> Result<SyncEngine<S>, EngineError> {
        let EngineOptions { catalog, config, ledger, sink, forbidden } = self.options;
        let store = self.state.0;

        if config.liveness_key.is_empty() || config.liveness_key.contains('.') {
            return Err(EngineError::InvalidConfig {
                message: format!("liveness key '{}' must be a single path segment", config.liveness_key)
                    .into(),
                context: None,
            });
        }
        if config.execution_interval_secs == Some(0) {
            return Err(EngineError::InvalidConfig {
                message: "execution interval must be at least one second".into(),
                context: None,
            });
        }

        let sanitizer = Sanitizer::new(forbidden.unwrap_or_else(|| store.forbidden_chars()));
        let ledger = WarnLedger::open(
            ledger.unwrap_or_else(|| Box::new(FileLedger::new(config.ledger_path.clone()))),
        );
        let telemetry = Telemetry::new(sink.unwrap_or_else(|| Arc::new(DiscardSink)), config.telemetry_enabled);

        info!(
            definitions = catalog.len(),
            known_warnings = ledger.len(),
            execution_interval_secs = config.execution_interval_secs,
            telemetry = telemetry.is_enabled(),
            "Sync engine opened"
        );

        Ok(SyncEngine::from_inner(EngineInner {
            store,
            catalog,
            config,
            sanitizer,
            cache: DefinitionCache::default(),
            subscriptions: SubscriptionSet::default(),
            ledger,
            timers: ExpiryTimers::default(),
            telemetry,
        }))
    }
}
