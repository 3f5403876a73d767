use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Instant;

use rayon::prelude::*;
use walkdir::WalkDir;

use super::{DocumentId, Vault};
use crate::frontmatter::types::Header;
use crate::frontmatter::FrontmatterParser;

/// Outcome of re-reading one note from disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// The note was not cached before
    Added,
    /// The note was cached and has been re-parsed
    Updated,
    /// The file no longer exists and was dropped from the cache
    Removed,
    /// Not a tracked note
    Ignored,
}

/// Vault backed by a directory of markdown notes.
///
/// Headers are parsed once and cached; the watcher keeps the cache current by
/// calling `refresh`, `forget` and `rename` before it notifies the field index.
pub struct FsVault {
    root: PathBuf,
    headers: RwLock<HashMap<DocumentId, Option<Header>>>,
}

impl FsVault {
    /// Scan `root` and parse every note header (parallel, CPU-bound)
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, String> {
        let root = root.into();
        if !root.is_dir() {
            return Err(format!("Vault path is not a directory: {:?}", root));
        }

        let start = Instant::now();
        let paths = collect_md_files(&root, &root);
        let headers: HashMap<DocumentId, Option<Header>> = paths
            .par_iter()
            .filter_map(|path| {
                let doc = DocumentId::from_path(&root, path)?;
                Some((doc, read_header(path)))
            })
            .collect();

        log::info!(
            "[FsVault] Parsed {} note headers in {:?} for vault: {:?}",
            headers.len(),
            start.elapsed(),
            root
        );

        Ok(Self {
            root,
            headers: RwLock::new(headers),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn document_id(&self, path: &Path) -> Option<DocumentId> {
        DocumentId::from_path(&self.root, path)
    }

    pub fn absolute_path(&self, doc: &DocumentId) -> PathBuf {
        doc.as_str()
            .split('/')
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    pub fn contains(&self, doc: &DocumentId) -> bool {
        self.headers
            .read()
            .map(|headers| headers.contains_key(doc))
            .unwrap_or(false)
    }

    /// Re-read a note after a create or modify event
    pub fn refresh(&self, doc: &DocumentId) -> Result<Refresh, String> {
        if !doc.is_note() {
            return Ok(Refresh::Ignored);
        }
        let path = self.absolute_path(doc);
        let mut headers = self.headers.write().map_err(|e| e.to_string())?;

        if !path.is_file() {
            return Ok(match headers.remove(doc) {
                Some(_) => Refresh::Removed,
                None => Refresh::Ignored,
            });
        }

        let header = read_header(&path);
        match headers.insert(doc.clone(), header) {
            Some(_) => Ok(Refresh::Updated),
            None => Ok(Refresh::Added),
        }
    }

    /// Drop a deleted note; returns whether it was known
    pub fn forget(&self, doc: &DocumentId) -> Result<bool, String> {
        let mut headers = self.headers.write().map_err(|e| e.to_string())?;
        Ok(headers.remove(doc).is_some())
    }

    /// Move a cached header to its new id without re-reading the file
    pub fn rename(&self, from: &DocumentId, to: &DocumentId) -> Result<bool, String> {
        let mut headers = self.headers.write().map_err(|e| e.to_string())?;
        match headers.remove(from) {
            Some(header) => {
                if to.is_note() {
                    headers.insert(to.clone(), header);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Tracked notes inside the folder `prefix`, sorted
    pub fn documents_under(&self, prefix: &DocumentId) -> Vec<DocumentId> {
        let folder = format!("{}/", prefix.as_str().trim_end_matches('/'));
        let mut docs: Vec<DocumentId> = self
            .headers
            .read()
            .map(|headers| {
                headers
                    .keys()
                    .filter(|doc| doc.as_str().starts_with(&folder))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        docs.sort();
        docs
    }

    /// Notes currently on disk below `dir`, tracked or not
    pub fn scan(&self, dir: &Path) -> Vec<DocumentId> {
        collect_md_files(&self.root, dir)
            .iter()
            .filter_map(|path| self.document_id(path))
            .collect()
    }
}

/// Walk `start` for notes, skipping hidden and `_att` directories
fn collect_md_files(root: &Path, start: &Path) -> Vec<PathBuf> {
    WalkDir::new(start)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            if name.starts_with('.') {
                return false;
            }
            !(entry.file_type().is_dir() && name.ends_with("_att"))
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            DocumentId::from_path(root, entry.path())
                .map(|doc| doc.is_note())
                .unwrap_or(false)
        })
        .map(|entry| entry.path().to_path_buf())
        .collect()
}

/// Read and parse a note header; read or YAML errors count as no header
fn read_header(path: &Path) -> Option<Header> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            log::debug!("[FsVault] Failed to read {:?}: {}", path, e);
            return None;
        }
    };
    match FrontmatterParser::parse(&content) {
        Ok((header, _)) => header,
        Err(e) => {
            log::debug!("[FsVault] Unparseable frontmatter in {:?}: {}", path, e);
            None
        }
    }
}

impl Vault for FsVault {
    fn documents(&self) -> Vec<DocumentId> {
        let mut docs: Vec<DocumentId> = self
            .headers
            .read()
            .map(|headers| headers.keys().cloned().collect())
            .unwrap_or_default();
        docs.sort();
        docs
    }

    fn header(&self, doc: &DocumentId) -> Option<Header> {
        self.headers.read().ok()?.get(doc).cloned().flatten()
    }
}
