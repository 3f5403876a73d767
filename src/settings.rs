use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::atomic_write_file;
use crate::fields::IndexOptions;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;

/// Field statistics panel settings, stored per vault.
/// Missing keys in the stored file take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub page_size: usize,
    pub ignore_fields: BTreeSet<String>,
    pub cache_ttl_secs: u64,
    pub analyze_values: bool,
    pub show_progress: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            ignore_fields: BTreeSet::new(),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            analyze_values: false,
            show_progress: true,
        }
    }
}

impl Settings {
    pub fn settings_path(vault_path: &Path) -> PathBuf {
        vault_path.join(".notology").join("field-stats.json")
    }

    /// Load stored settings merged over defaults.
    /// A missing or unreadable file yields the defaults.
    pub fn load(vault_path: &Path) -> Settings {
        let path = Self::settings_path(vault_path);
        if !path.exists() {
            return Settings::default();
        }
        match fs::read_to_string(&path) {
            Ok(content) => Self::from_json(&content).unwrap_or_else(|e| {
                log::warn!("[Settings] Ignoring unreadable {:?}: {}", path, e);
                Settings::default()
            }),
            Err(e) => {
                log::warn!("[Settings] Failed to read {:?}: {}", path, e);
                Settings::default()
            }
        }
    }

    pub fn from_json(content: &str) -> Result<Settings, String> {
        let settings: Settings = serde_json::from_str(content)
            .map_err(|e| format!("Failed to parse settings: {}", e))?;
        Ok(settings.sanitized())
    }

    pub fn save(&self, vault_path: &Path) -> Result<(), String> {
        let path = Self::settings_path(vault_path);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| e.to_string())?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        atomic_write_file(&path, content.as_bytes())
    }

    /// Replace out-of-range values with defaults
    pub fn sanitized(mut self) -> Settings {
        if self.page_size == 0 {
            log::warn!("[Settings] page_size must be positive, using {}", DEFAULT_PAGE_SIZE);
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        if self.cache_ttl_secs == 0 {
            log::warn!(
                "[Settings] cache_ttl_secs must be positive, using {}",
                DEFAULT_CACHE_TTL_SECS
            );
            self.cache_ttl_secs = DEFAULT_CACHE_TTL_SECS;
        }
        self.ignore_fields = self
            .ignore_fields
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        self
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            ignore_fields: self.ignore_fields.clone(),
            analyze_values: self.analyze_values,
        }
    }

    /// Whether switching from `self` to `other` changes which fields or stats exist
    pub fn changes_derivation(&self, other: &Settings) -> bool {
        self.ignore_fields != other.ignore_fields || self.analyze_values != other.analyze_values
    }
}
