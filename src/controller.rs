use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tokio::sync::{Mutex, MutexGuard};

use crate::clock::Clock;
use crate::fields::{paginate, percent, FieldIndex, FieldRecord, ProgressFn};
use crate::settings::Settings;
use crate::vault::{DocumentId, Vault, VaultEvent};

/// A rebuild hands control back to the runtime after this many documents
pub const REBUILD_YIELD_EVERY: usize = 64;
/// `get_fields` gives up rebuilding after this many cancelled attempts
pub const MAX_REBUILD_ATTEMPTS: usize = 3;

/// Everything that may change the field index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Rebuild,
    Created(DocumentId),
    Changed(DocumentId),
    Deleted(DocumentId),
    Renamed { from: DocumentId, to: DocumentId },
    Invalidate,
}

impl From<VaultEvent> for Command {
    fn from(event: VaultEvent) -> Self {
        match event {
            VaultEvent::Changed(doc) => Command::Changed(doc),
            VaultEvent::Created(doc) => Command::Created(doc),
            VaultEvent::Deleted(doc) => Command::Deleted(doc),
            VaultEvent::Renamed { from, to } => Command::Renamed { from, to },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    Completed { documents: usize },
    /// An invalidation arrived mid-rebuild; partial results were dropped
    Cancelled,
}

/// Progress tracking for full rebuilds, readable without the index lock
#[derive(Default)]
pub struct IndexProgress {
    pub total: AtomicUsize,
    pub completed: AtomicUsize,
    pub is_running: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub is_running: bool,
}

impl IndexProgress {
    fn begin(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.is_running.store(true, Ordering::SeqCst);
    }

    fn finish(&self) {
        self.is_running.store(false, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            is_running: self.is_running.load(Ordering::SeqCst),
        }
    }
}

/// Sole owner of the field index.
///
/// Reads, rebuilds and incremental updates all go through one async mutex, so a
/// reader never sees a half-applied update. `clear_cache` does not wait for that
/// mutex: it bumps an epoch that an in-flight rebuild checks between documents,
/// and marks the index stale so whoever takes the lock next starts from empty.
pub struct FieldStatsController {
    vault: Arc<dyn Vault>,
    clock: Arc<dyn Clock>,
    settings: RwLock<Settings>,
    index: Mutex<FieldIndex>,
    epoch: AtomicU64,
    stale: AtomicBool,
    rebuilds: AtomicUsize,
    pub progress: Arc<IndexProgress>,
}

impl FieldStatsController {
    pub fn new(vault: Arc<dyn Vault>, clock: Arc<dyn Clock>, settings: Settings) -> Self {
        let settings = settings.sanitized();
        let index = FieldIndex::new(settings.index_options());
        Self {
            vault,
            clock,
            settings: RwLock::new(settings),
            index: Mutex::new(index),
            epoch: AtomicU64::new(0),
            stale: AtomicBool::new(false),
            rebuilds: AtomicUsize::new(0),
            progress: Arc::new(IndexProgress::default()),
        }
    }

    pub fn settings(&self) -> Settings {
        match self.settings.read() {
            Ok(settings) => settings.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the settings. Returns true when the change forced a cache clear
    /// (ignore list or value analysis changed).
    pub fn update_settings(&self, settings: Settings) -> bool {
        let settings = settings.sanitized();
        let invalidate = {
            let mut current = match self.settings.write() {
                Ok(current) => current,
                Err(poisoned) => poisoned.into_inner(),
            };
            let invalidate = current.changes_derivation(&settings);
            *current = settings;
            invalidate
        };
        if invalidate {
            log::info!("[Controller] Settings change affects field derivation, clearing cache");
            self.invalidate();
        }
        invalidate
    }

    /// One page of `fields` at the configured page size
    pub fn page<'a>(&self, fields: &'a [FieldRecord], page_index: usize) -> &'a [FieldRecord] {
        paginate(fields, self.settings().page_size, page_index)
    }

    /// Number of completed full rebuilds
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds.load(Ordering::SeqCst)
    }

    /// Fields sorted by document count. Serves the cache while it is younger than
    /// the TTL, otherwise rebuilds from the vault first.
    ///
    /// When every one of the `MAX_REBUILD_ATTEMPTS` rebuilds is cancelled the
    /// result is whatever the index holds after the last invalidation, which is
    /// normally empty. Use `get_fields_checked` to tell that case apart.
    pub async fn get_fields(&self, progress: Option<ProgressFn<'_>>) -> Vec<FieldRecord> {
        self.get_fields_checked(progress).await.0
    }

    /// Like `get_fields`, also reporting whether the fields reflect a completed
    /// rebuild (or a fresh cache). `Cancelled` means the list may be partial.
    pub async fn get_fields_checked(
        &self,
        progress: Option<ProgressFn<'_>>,
    ) -> (Vec<FieldRecord>, RebuildOutcome) {
        for attempt in 1..=MAX_REBUILD_ATTEMPTS {
            let mut index = self.lock_index().await;
            let ttl = self.settings().cache_ttl_secs;
            if index.is_fresh(self.clock.now(), ttl) {
                log::debug!("[Controller] Serving {} cached fields", index.len());
                let documents = index.tracked_count();
                return (index.fields(), RebuildOutcome::Completed { documents });
            }
            match self.rebuild_locked(&mut index, progress).await {
                outcome @ RebuildOutcome::Completed { .. } => return (index.fields(), outcome),
                RebuildOutcome::Cancelled => log::info!(
                    "[Controller] Rebuild cancelled (attempt {}/{})",
                    attempt,
                    MAX_REBUILD_ATTEMPTS
                ),
            }
        }
        log::warn!("[Controller] Rebuild kept getting cancelled, serving current index");
        (self.lock_index().await.fields(), RebuildOutcome::Cancelled)
    }

    /// Forget the cached index; the next read rebuilds. Also cancels a running rebuild.
    pub fn clear_cache(&self) {
        self.invalidate();
    }

    pub fn invalidate(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.stale.store(true, Ordering::SeqCst);
    }

    /// Unconditional full rebuild
    pub async fn rebuild(&self, progress: Option<ProgressFn<'_>>) -> RebuildOutcome {
        let mut index = self.lock_index().await;
        self.rebuild_locked(&mut index, progress).await
    }

    pub async fn apply_created(&self, doc: &DocumentId) -> bool {
        let mut index = self.lock_index().await;
        index.apply_created(self.vault.as_ref(), doc)
    }

    pub async fn apply_changed(&self, doc: &DocumentId) -> bool {
        let mut index = self.lock_index().await;
        index.apply_changed(self.vault.as_ref(), doc)
    }

    pub async fn apply_deleted(&self, doc: &DocumentId) -> bool {
        let mut index = self.lock_index().await;
        index.apply_deleted(doc)
    }

    pub async fn apply_renamed(&self, from: &DocumentId, to: &DocumentId) -> bool {
        let mut index = self.lock_index().await;
        index.apply_renamed(self.vault.as_ref(), from, to)
    }

    /// Run one command. Returns whether it changed or rebuilt the index.
    pub async fn execute(&self, command: Command) -> bool {
        match command {
            Command::Rebuild => matches!(self.rebuild(None).await, RebuildOutcome::Completed { .. }),
            Command::Created(doc) => self.apply_created(&doc).await,
            Command::Changed(doc) => self.apply_changed(&doc).await,
            Command::Deleted(doc) => self.apply_deleted(&doc).await,
            Command::Renamed { from, to } => self.apply_renamed(&from, &to).await,
            Command::Invalidate => {
                self.invalidate();
                true
            }
        }
    }

    pub async fn handle_event(&self, event: VaultEvent) -> bool {
        self.execute(event.into()).await
    }

    /// Take the index lock, applying a pending invalidation first
    async fn lock_index(&self) -> MutexGuard<'_, FieldIndex> {
        let mut index = self.index.lock().await;
        if self.stale.swap(false, Ordering::SeqCst) {
            *index = FieldIndex::new(self.settings().index_options());
            log::info!("[Controller] Field cache cleared");
        }
        index
    }

    async fn rebuild_locked(
        &self,
        index: &mut FieldIndex,
        progress: Option<ProgressFn<'_>>,
    ) -> RebuildOutcome {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let settings = self.settings();
        let report = if settings.show_progress { progress } else { None };

        let start = Instant::now();
        let docs = self.vault.documents();
        let total = docs.len();
        self.progress.begin(total);
        log::info!("[Controller] Rebuilding field index from {} documents", total);

        // Built off to the side and swapped in at the end
        let mut fresh = FieldIndex::new(settings.index_options());
        for (i, doc) in docs.iter().enumerate() {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                log::info!("[Controller] Rebuild cancelled after {}/{} documents", i, total);
                self.progress.finish();
                return RebuildOutcome::Cancelled;
            }

            let header = self.vault.header(doc);
            fresh.ingest(doc, header.as_ref());
            self.progress.completed.fetch_add(1, Ordering::SeqCst);
            if let Some(report) = report {
                report(percent(i + 1, total));
            }

            if (i + 1) % REBUILD_YIELD_EVERY == 0 {
                tokio::task::yield_now().await;
            }
        }
        if total == 0 {
            if let Some(report) = report {
                report(100);
            }
        }
        self.progress.finish();

        if self.epoch.load(Ordering::SeqCst) != epoch {
            log::info!("[Controller] Rebuild finished after invalidation, discarding");
            return RebuildOutcome::Cancelled;
        }

        fresh.finish_rebuild(self.clock.now());
        *index = fresh;
        self.rebuilds.fetch_add(1, Ordering::SeqCst);
        log::info!(
            "[Controller] Field index rebuilt: {} fields from {} documents in {:?}",
            index.len(),
            total,
            start.elapsed()
        );
        RebuildOutcome::Completed { documents: total }
    }
}
