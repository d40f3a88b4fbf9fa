//! Process-wide deduplication of missing-definition warnings, persisted across restarts.

use crate::error::{LedgerError, LedgerErrorExt};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

pub type LedgerEntries = BTreeMap<String, String>;

/// Future returned by [`LedgerBackend::save`].
pub type SaveFuture<'a> = Pin<Box<dyn Future<Output = Result<(), LedgerError>> + Send + 'a>>;

/// Durable storage behind a [`WarnLedger`].
///
/// `save` always receives the complete entry set and replaces whatever was stored before.
/// `load` runs once while the engine is built; `save` runs on the async runtime.
pub trait LedgerBackend: Send + Sync + fmt::Debug {
    /// Returns the stored entries, or an empty set when nothing was persisted yet.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError`] when stored data exists but cannot be read.
    fn load(&self) -> Result<LedgerEntries, LedgerError>;

    /// # Errors
    ///
    /// The future resolves to a [`LedgerError`] when the entries cannot be written.
    fn save<'a>(&'a self, entries: &'a LedgerEntries) -> SaveFuture<'a>;
}

/// Ledger persisted as one flat JSON object on disk.
///
/// Writes go to a unique temporary sibling first, are synced, and then renamed over the
/// target, so a crash never leaves a truncated ledger behind.
#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    tmp_counter: AtomicU64,
}

impl FileLedger {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), tmp_counter: AtomicU64::new(1) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let counter = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let file_name = self.path.file_name().and_then(|s| s.to_str()).unwrap_or("ledger");
        self.path.with_file_name(format!("{file_name}.leafsynctmp.{counter}"))
    }

    async fn write_atomic(&self, entries: &LedgerEntries) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create ledger directory: {}", parent.display()))?;
        }

        let data = serde_json::to_vec_pretty(entries).context("Serializing warn ledger")?;
        let temp = self.tmp_path();
        {
            let mut file = fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&temp)
                .await
                .context(format!("Temp creation failed: {}", temp.display()))?;
            file.write_all(&data).await.context("Write failed")?;
            file.sync_all().await.context("Hardware sync failed")?;
        }

        if let Err(err) = fs::rename(&temp, &self.path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(LedgerError::Io {
                source: err,
                context: Some(
                    format!("Atomic swap failed: {} -> {}", temp.display(), self.path.display()).into(),
                ),
            });
        }

        debug!(path = %self.path.display(), entries = entries.len(), "Warn ledger saved");
        Ok(())
    }
}

impl LedgerBackend for FileLedger {
    fn load(&self) -> Result<LedgerEntries, LedgerError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No warn ledger on disk yet");
                return Ok(LedgerEntries::new());
            },
            Err(err) => {
                return Err(LedgerError::Io {
                    source: err,
                    context: Some(format!("Read failed: {}", self.path.display()).into()),
                });
            },
        };
        serde_json::from_str(&text).context(format!("Parsing {}", self.path.display()))
    }

    fn save<'a>(&'a self, entries: &'a LedgerEntries) -> SaveFuture<'a> {
        Box::pin(self.write_atomic(entries))
    }
}

/// Volatile backend that remembers the last saved set and counts saves.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    stored: Mutex<LedgerEntries>,
    saves: AtomicUsize,
}

impl MemoryLedger {
    #[must_use]
    pub fn with_entries(entries: LedgerEntries) -> Self {
        Self { stored: Mutex::new(entries), saves: AtomicUsize::new(0) }
    }

    #[must_use]
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn stored(&self) -> LedgerEntries {
        self.stored.lock().clone()
    }
}

impl LedgerBackend for MemoryLedger {
    fn load(&self) -> Result<LedgerEntries, LedgerError> {
        Ok(self.stored.lock().clone())
    }

    fn save<'a>(&'a self, entries: &'a LedgerEntries) -> SaveFuture<'a> {
        self.stored.lock().clone_from(entries);
        self.saves.fetch_add(1, Ordering::AcqRel);
        Box::pin(std::future::ready(Ok(())))
    }
}

impl<T: LedgerBackend + ?Sized> LedgerBackend for std::sync::Arc<T> {
    fn load(&self) -> Result<LedgerEntries, LedgerError> {
        (**self).load()
    }

    fn save<'a>(&'a self, entries: &'a LedgerEntries) -> SaveFuture<'a> {
        (**self).save(entries)
    }
}

/// Outcome of [`WarnLedger::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// The key was already present; nothing was written.
    Known,
    /// The key was new and the ledger was persisted.
    New,
}

/// Name -> message record of warnings already emitted.
///
/// The entry map is only locked for lookups and inserts. Saves run outside that lock,
/// one at a time behind `write_gate`, and each one snapshots the map after entering the
/// gate, so a later save never carries fewer entries than an earlier one.
#[derive(Debug)]
pub struct WarnLedger {
    entries: Mutex<LedgerEntries>,
    write_gate: tokio::sync::Mutex<()>,
    backend: Box<dyn LedgerBackend>,
}

impl WarnLedger {
    /// Loads the persisted entries. An unreadable ledger is logged and replaced by an
    /// empty one, so a corrupt file never blocks startup.
    #[must_use]
    pub fn open(backend: Box<dyn LedgerBackend>) -> Self {
        let entries = backend.load().unwrap_or_else(|err| {
            warn!(error = %err, "Warn ledger unreadable, starting empty");
            LedgerEntries::new()
        });
        debug!(entries = entries.len(), "Warn ledger opened");
        Self { entries: Mutex::new(entries), write_gate: tokio::sync::Mutex::new(()), backend }
    }

    /// Records `message` under `key` unless the key is already known.
    ///
    /// The check and the insert are atomic, so concurrent callers for one key see exactly
    /// one [`Recorded::New`]. A failed save keeps the entry in memory.
    ///
    /// # Errors
    ///
    /// Returns the backend's [`LedgerError`] when the new entry could not be persisted.
    pub async fn record(&self, key: &str, message: impl Into<String>) -> Result<Recorded, LedgerError> {
        {
            let mut entries = self.entries.lock();
            if entries.contains_key(key) {
                return Ok(Recorded::Known);
            }
            entries.insert(key.to_owned(), message.into());
        }
        self.persist().await.map(|()| Recorded::New)
    }

    /// Stores `message` under `key`; returns `Ok(false)` when the stored text was identical.
    ///
    /// # Errors
    ///
    /// Returns the backend's [`LedgerError`] when the change could not be persisted.
    pub async fn replace(&self, key: &str, message: impl Into<String>) -> Result<bool, LedgerError> {
        let message = message.into();
        {
            let mut entries = self.entries.lock();
            if entries.get(key) == Some(&message) {
                return Ok(false);
            }
            entries.insert(key.to_owned(), message);
        }
        self.persist().await.map(|()| true)
    }

    async fn persist(&self) -> Result<(), LedgerError> {
        let _gate = self.write_gate.lock().await;
        let snapshot = self.entries.lock().clone();
        self.backend.save(&snapshot).await
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Backend whose save parks until the test releases it.
    #[derive(Debug, Default)]
    struct HeldBackend {
        entered: Notify,
        release: Notify,
        stored: Mutex<LedgerEntries>,
    }

    impl LedgerBackend for HeldBackend {
        fn load(&self) -> Result<LedgerEntries, LedgerError> {
            Ok(LedgerEntries::new())
        }

        fn save<'a>(&'a self, entries: &'a LedgerEntries) -> SaveFuture<'a> {
            Box::pin(async move {
                self.entered.notify_one();
                self.release.notified().await;
                self.stored.lock().clone_from(entries);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn record_deduplicates_and_saves_once() {
        let backend = Arc::new(MemoryLedger::default());
        let ledger = WarnLedger::open(Box::new(backend.clone()));

        assert_eq!(ledger.record("voltage", "missing voltage").await.unwrap(), Recorded::New);
        assert_eq!(ledger.record("voltage", "missing voltage").await.unwrap(), Recorded::Known);
        assert_eq!(backend.saves(), 1);
        assert_eq!(backend.stored().get("voltage").map(String::as_str), Some("missing voltage"));
    }

    #[tokio::test]
    async fn replace_only_saves_on_change() {
        let backend = Arc::new(MemoryLedger::default());
        let ledger = WarnLedger::open(Box::new(backend.clone()));

        assert!(ledger.replace("versionInfo", "1.0.0").await.unwrap());
        assert!(!ledger.replace("versionInfo", "1.0.0").await.unwrap());
        assert!(ledger.replace("versionInfo", "1.1.0").await.unwrap());
        assert_eq!(backend.saves(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn lookups_proceed_while_a_save_is_pending() {
        let backend = Arc::new(HeldBackend::default());
        let ledger = Arc::new(WarnLedger::open(Box::new(backend.clone())));

        let pending = tokio::spawn({
            let ledger = ledger.clone();
            async move { ledger.record("current", "missing current").await }
        });
        backend.entered.notified().await;

        assert!(ledger.contains("current"));
        assert_eq!(ledger.len(), 1);
        assert!(backend.stored.lock().is_empty());

        backend.release.notify_one();
        assert_eq!(pending.await.unwrap().unwrap(), Recorded::New);
        assert!(backend.stored.lock().contains_key("current"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_records_end_with_every_entry_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warn_messages.json");
        let ledger = Arc::new(WarnLedger::open(Box::new(FileLedger::new(&path))));

        let mut tasks = tokio::task::JoinSet::new();
        for n in 0..16 {
            let ledger = ledger.clone();
            tasks.spawn(async move { ledger.record(&format!("leaf{n}"), "missing").await });
        }
        while let Some(joined) = tasks.join_next().await {
            assert_eq!(joined.unwrap().unwrap(), Recorded::New);
        }

        let saved = FileLedger::new(&path).load().unwrap();
        assert_eq!(saved.len(), 16);
    }

    #[tokio::test]
    async fn file_ledger_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("warn_messages.json");

        let ledger = WarnLedger::open(Box::new(FileLedger::new(&path)));
        assert_eq!(ledger.len(), 0);
        ledger.record("current", "No attribute definition for 'current'").await.unwrap();

        let reopened = WarnLedger::open(Box::new(FileLedger::new(&path)));
        assert!(reopened.contains("current"));
        assert_eq!(reopened.record("current", "again").await.unwrap(), Recorded::Known);

        let leftovers = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().contains(".leafsynctmp."))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warn_messages.json");
        std::fs::write(&path, "not json").unwrap();

        let err = FileLedger::new(&path).load().unwrap_err();
        assert_eq!(err.kind(), "format");
        assert_eq!(WarnLedger::open(Box::new(FileLedger::new(&path))).len(), 0);
    }
}
