use notify::event::{ModifyKind, RenameMode};
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;

use crate::controller::FieldStatsController;
use crate::vault::fs::{FsVault, Refresh};
use crate::vault::{DocumentId, VaultEvent, TEMP_FILE_SUFFIX};

/// What to do with one filesystem notification
#[derive(Debug, Clone, PartialEq, Eq)]
enum WatchAction {
    /// Re-read once the path has been quiet for the debounce window
    Touch(PathBuf),
    Remove(PathBuf),
    Rename { from: PathBuf, to: PathBuf },
}

pub struct VaultWatcher {
    _watcher: RecommendedWatcher,
}

impl VaultWatcher {
    /// Watch the vault directory and keep both the header cache and the field
    /// index current. `controller` must have been built over the same `vault`.
    ///
    /// Events are handled on a background thread that drives the controller
    /// through `runtime`, so this must not be called from inside an async task
    /// that `runtime` would need to make progress.
    pub fn start(
        vault: Arc<FsVault>,
        controller: Arc<FieldStatsController>,
        runtime: Handle,
    ) -> Result<Self, String> {
        let root = vault.root().to_path_buf();
        let (tx, rx) = mpsc::channel();

        // Poll interval 300ms for network drives and sync folders
        let mut watcher = RecommendedWatcher::new(
            tx,
            Config::default().with_poll_interval(Duration::from_millis(300)),
        )
        .map_err(|e| e.to_string())?;

        watcher
            .watch(root.as_path(), RecursiveMode::Recursive)
            .map_err(|e| e.to_string())?;
        log::info!("[Watcher] Watching vault: {:?}", root);

        let dispatcher = Dispatcher {
            vault,
            controller,
            runtime,
        };
        thread::spawn(move || {
            let mut pending_paths: HashMap<PathBuf, Instant> = HashMap::new();
            let base_debounce = Duration::from_millis(250);
            let extended_debounce = Duration::from_millis(500);
            // Many files at once (sync catch-up after wake-up)
            let burst_debounce = Duration::from_secs(2);
            let burst_threshold: usize = 10;
            let mut burst_event_count: usize = 0;
            let mut burst_window_start = Instant::now();

            loop {
                match rx.recv_timeout(base_debounce) {
                    Ok(Ok(event)) => {
                        let now = Instant::now();

                        if burst_window_start.elapsed() > Duration::from_secs(2) {
                            burst_event_count = 0;
                            burst_window_start = Instant::now();
                        }
                        burst_event_count += event.paths.len();

                        let actions = plan(&root, &event.kind, &event.paths);
                        let mut removals = Vec::new();
                        for action in actions {
                            match action {
                                WatchAction::Touch(path) => {
                                    pending_paths.insert(path, now);
                                }
                                WatchAction::Remove(path) => {
                                    pending_paths.remove(&path);
                                    removals.push(path);
                                }
                                WatchAction::Rename { from, to } => {
                                    pending_paths.remove(&from);
                                    pending_paths.remove(&to);
                                    dispatcher.renamed(&from, &to);
                                }
                            }
                        }

                        // Removals get a short grace period, sync clients sometimes
                        // delete and immediately recreate
                        if !removals.is_empty() {
                            thread::sleep(Duration::from_millis(100));
                            for path in removals {
                                if !path.exists() {
                                    dispatcher.removed(&path);
                                }
                            }
                        }
                    }
                    Ok(Err(e)) => {
                        log::warn!("[Watcher] File watcher error: {}", e);
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        let now = Instant::now();
                        let effective_debounce = if burst_event_count > burst_threshold {
                            log::debug!(
                                "[Watcher] Burst detected ({} events), using extended debounce",
                                burst_event_count
                            );
                            burst_debounce
                        } else {
                            extended_debounce
                        };

                        let (stable, still_pending): (HashMap<_, _>, HashMap<_, _>) = pending_paths
                            .drain()
                            .partition(|(_, last_event)| {
                                now.duration_since(*last_event) >= effective_debounce
                            });
                        pending_paths = still_pending;

                        if !stable.is_empty() {
                            log::debug!("[Watcher] Processing {} stable paths", stable.len());
                        }
                        for path in stable.into_keys() {
                            dispatcher.touched(&path);
                        }

                        if pending_paths.is_empty() {
                            burst_event_count = 0;
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => {
                        log::info!("[Watcher] Event channel closed, stopping");
                        break;
                    }
                }
            }
        });

        Ok(VaultWatcher { _watcher: watcher })
    }
}

/// Applies settled filesystem changes to the vault cache, then tells the controller
struct Dispatcher {
    vault: Arc<FsVault>,
    controller: Arc<FieldStatsController>,
    runtime: Handle,
}

impl Dispatcher {
    fn send(&self, event: VaultEvent) {
        log::debug!("[Watcher] {:?}", event);
        self.runtime.block_on(self.controller.handle_event(event));
    }

    /// A path settled after create/modify events. It may have disappeared since.
    fn touched(&self, path: &Path) {
        if !path.exists() {
            self.removed(path);
            return;
        }
        if path.is_dir() {
            // A folder moved in from outside the vault
            for doc in self.vault.scan(path) {
                if !self.vault.contains(&doc) {
                    self.refresh(&doc);
                }
            }
            return;
        }
        if let Some(doc) = self.vault.document_id(path) {
            self.refresh(&doc);
        }
    }

    fn refresh(&self, doc: &DocumentId) {
        match self.vault.refresh(doc) {
            Ok(Refresh::Added) => self.send(VaultEvent::Created(doc.clone())),
            Ok(Refresh::Updated) => self.send(VaultEvent::Changed(doc.clone())),
            Ok(Refresh::Removed) => self.send(VaultEvent::Deleted(doc.clone())),
            Ok(Refresh::Ignored) => {}
            Err(e) => log::warn!("[Watcher] Failed to refresh {}: {}", doc, e),
        }
    }

    /// A file or folder is gone; drop every note it held
    fn removed(&self, path: &Path) {
        let Some(doc) = self.vault.document_id(path) else {
            return;
        };
        let mut gone = self.vault.documents_under(&doc);
        if self.vault.contains(&doc) {
            gone.push(doc);
        }
        for doc in gone {
            match self.vault.forget(&doc) {
                Ok(true) => self.send(VaultEvent::Deleted(doc)),
                Ok(false) => {}
                Err(e) => log::warn!("[Watcher] Failed to forget {}: {}", doc, e),
            }
        }
    }

    fn renamed(&self, from: &Path, to: &Path) {
        let (Some(from_doc), Some(to_doc)) = (self.vault.document_id(from), self.vault.document_id(to))
        else {
            self.removed(from);
            self.touched(to);
            return;
        };

        if to.is_dir() {
            let prefix_len = from_doc.as_str().len();
            for doc in self.vault.documents_under(&from_doc) {
                let target = DocumentId::new(format!("{}{}", to_doc, &doc.as_str()[prefix_len..]));
                self.rename_note(&doc, &target);
            }
            self.touched(to);
            return;
        }
        self.rename_note(&from_doc, &to_doc);
    }

    fn rename_note(&self, from: &DocumentId, to: &DocumentId) {
        match self.vault.rename(from, to) {
            Ok(true) => self.send(VaultEvent::Renamed {
                from: from.clone(),
                to: to.clone(),
            }),
            // Unknown source, e.g. a temp file renamed over a note
            Ok(false) => self.refresh(to),
            Err(e) => log::warn!("[Watcher] Failed to rename {} -> {}: {}", from, to, e),
        }
    }
}

/// Translate one notify event into actions on paths inside the vault
fn plan(root: &Path, kind: &EventKind, paths: &[PathBuf]) -> Vec<WatchAction> {
    match kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() == 2 => {
            let (from, to) = (&paths[0], &paths[1]);
            match (should_process_path(from, root), should_process_path(to, root)) {
                (true, true) => vec![WatchAction::Rename {
                    from: from.clone(),
                    to: to.clone(),
                }],
                (false, true) => vec![WatchAction::Touch(to.clone())],
                (true, false) => vec![WatchAction::Remove(from.clone())],
                (false, false) => Vec::new(),
            }
        }
        EventKind::Remove(_) => paths
            .iter()
            .filter(|path| should_process_path(path, root))
            .map(|path| WatchAction::Remove(path.clone()))
            .collect(),
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any => paths
            .iter()
            .filter(|path| should_process_path(path, root))
            .map(|path| WatchAction::Touch(path.clone()))
            .collect(),
        EventKind::Access(_) | EventKind::Other => Vec::new(),
    }
}

/// Paths inside the vault that may hold notes: not temp files from atomic
/// writes, not under hidden directories or `_att` attachment folders.
/// Folders pass too, their renames and removals carry the notes inside.
fn should_process_path(path: &Path, vault_path: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(vault_path) else {
        return false;
    };

    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if file_name.ends_with(TEMP_FILE_SUFFIX) {
        return false;
    }

    let mut has_component = false;
    for component in relative.components() {
        if let Component::Normal(name) = component {
            let name_str = name.to_string_lossy();
            if name_str.starts_with('.') || name_str.ends_with("_att") {
                return false;
            }
            has_component = true;
        }
    }
    has_component
}
