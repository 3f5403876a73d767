pub mod clock;
pub mod controller;
pub mod fields;
pub mod frontmatter;
pub mod settings;
pub mod vault;



use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{Command, FieldStatsController, RebuildOutcome};
pub use fields::stats::{ValueCount, ValueStats};
pub use fields::watcher::VaultWatcher;
pub use fields::{FieldIndex, FieldRecord, IndexOptions};
pub use frontmatter::types::{Header, HeaderValue, ValueKind};
pub use settings::Settings;
pub use vault::fs::FsVault;
pub use vault::{DocumentId, MemoryVault, Vault, VaultEvent, TEMP_FILE_SUFFIX};

/// Atomic file write: write to a temp file in the same directory, then rename.
/// The watcher ignores the temp name, so it only ever sees the finished file.
pub(crate) fn atomic_write_file(path: &Path, content: &[u8]) -> Result<(), String> {
    use std::io::Write;

    let file_name = path
        .file_name()
        .ok_or_else(|| format!("Not a file path: {:?}", path))?
        .to_string_lossy();
    let temp_path = path.with_file_name(format!("{}{}", file_name, TEMP_FILE_SUFFIX));

    let mut file = fs::File::create(&temp_path)
        .map_err(|e| format!("Failed to create temp file {:?}: {}", temp_path, e))?;
    file.write_all(content)
        .map_err(|e| format!("Failed to write temp file {:?}: {}", temp_path, e))?;
    file.sync_all()
        .map_err(|e| format!("Failed to sync temp file {:?}: {}", temp_path, e))?;
    drop(file);

    fs::rename(&temp_path, path)
        .map_err(|e| format!("Failed to rename {:?} -> {:?}: {}", temp_path, path, e))?;

    Ok(())
}

/// Open the folder containing `path` in the platform file browser.
/// Failure is reported to the caller and leaves the index alone.
pub fn reveal_in_explorer(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Err(format!("Path does not exist: {:?}", path));
    }
    let dir = if path.is_dir() {
        path.to_path_buf()
    } else {
        path.parent().unwrap_or(path).to_path_buf()
    };
    opener::open(&dir).map_err(|e| format!("Failed to open {:?}: {}", dir, e))
}

/// Everything the field statistics panel needs for one open vault
pub struct FieldStatsSession {
    vault_path: PathBuf,
    vault: Arc<FsVault>,
    controller: Arc<FieldStatsController>,
    _watcher: Option<VaultWatcher>,
}

impl FieldStatsSession {
    /// Scan the vault, load its settings and, given a runtime, start watching it
    pub fn open(
        vault_path: impl Into<PathBuf>,
        runtime: Option<tokio::runtime::Handle>,
    ) -> Result<Self, String> {
        let vault_path = vault_path.into();
        let vault = Arc::new(FsVault::open(&vault_path)?);
        let settings = Settings::load(&vault_path);
        let controller = Arc::new(FieldStatsController::new(
            vault.clone(),
            Arc::new(SystemClock),
            settings,
        ));

        let watcher = match runtime {
            Some(handle) => match VaultWatcher::start(vault.clone(), controller.clone(), handle) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    log::warn!("Failed to start vault watcher (non-fatal): {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            vault_path,
            vault,
            controller,
            _watcher: watcher,
        })
    }

    pub fn vault_path(&self) -> &Path {
        &self.vault_path
    }

    pub fn vault(&self) -> &Arc<FsVault> {
        &self.vault
    }

    pub fn controller(&self) -> &Arc<FieldStatsController> {
        &self.controller
    }

    /// Apply new settings and persist them next to the vault
    pub fn save_settings(&self, settings: Settings) -> Result<bool, String> {
        let invalidated = self.controller.update_settings(settings);
        self.controller.settings().save(&self.vault_path)?;
        Ok(invalidated)
    }

    /// Reveal the folder holding `doc`
    pub fn reveal(&self, doc: &DocumentId) -> Result<(), String> {
        reveal_in_explorer(&self.vault.absolute_path(doc))
    }
}
