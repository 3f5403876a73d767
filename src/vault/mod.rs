pub mod fs;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path};
use std::sync::RwLock;

use crate::frontmatter::types::Header;
use crate::frontmatter::FrontmatterParser;

/// Suffix used by atomic writes for the temp file before rename
pub const TEMP_FILE_SUFFIX: &str = ".notology-tmp";

/// Vault-relative note path with `/` separators
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into().replace('\\', "/"))
    }

    /// Build an id from a filesystem path below `root`
    pub fn from_path(root: &Path, path: &Path) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?;
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => parts.push(name.to_string_lossy().to_string()),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if parts.is_empty() {
            return None;
        }
        Some(Self(parts.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this path is a note the field index tracks: a `.md` file outside
    /// hidden directories and `_att` attachment folders.
    pub fn is_note(&self) -> bool {
        if self.0.ends_with(TEMP_FILE_SUFFIX) || !self.0.ends_with(".md") {
            return false;
        }
        let mut components = self.0.split('/').peekable();
        while let Some(name) = components.next() {
            if name.is_empty() || name.starts_with('.') {
                return false;
            }
            // Only directories are checked for the attachment suffix
            if components.peek().is_some() && name.ends_with("_att") {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(path: &str) -> Self {
        DocumentId::new(path)
    }
}

impl From<String> for DocumentId {
    fn from(path: String) -> Self {
        DocumentId::new(path)
    }
}

/// Change notification delivered by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEvent {
    Changed(DocumentId),
    Created(DocumentId),
    Deleted(DocumentId),
    Renamed { from: DocumentId, to: DocumentId },
}

/// The document collection as seen by the field index.
///
/// Headers are already parsed by the host; implementations must not block on
/// disk here beyond reading their own cache.
pub trait Vault: Send + Sync {
    /// Every tracked note, sorted by id
    fn documents(&self) -> Vec<DocumentId>;

    /// The parsed header of a document, `None` when it has none or it is unparseable
    fn header(&self, doc: &DocumentId) -> Option<Header>;
}

/// In-memory vault for embedding hosts that parse notes themselves, and for tests
#[derive(Default)]
pub struct MemoryVault {
    docs: RwLock<BTreeMap<DocumentId, Option<Header>>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, doc: impl Into<DocumentId>, header: Option<Header>) {
        if let Ok(mut docs) = self.docs.write() {
            docs.insert(doc.into(), header);
        }
    }

    /// Insert a note from its markdown source; an unparseable header is stored as none
    pub fn insert_markdown(&self, doc: impl Into<DocumentId>, content: &str) {
        let header = FrontmatterParser::parse(content)
            .map(|(header, _)| header)
            .unwrap_or(None);
        self.insert(doc, header);
    }

    pub fn remove(&self, doc: &DocumentId) -> bool {
        self.docs
            .write()
            .map(|mut docs| docs.remove(doc).is_some())
            .unwrap_or(false)
    }

    pub fn rename(&self, from: &DocumentId, to: impl Into<DocumentId>) -> bool {
        let Ok(mut docs) = self.docs.write() else {
            return false;
        };
        match docs.remove(from) {
            Some(header) => {
                docs.insert(to.into(), header);
                true
            }
            None => false,
        }
    }
}

impl Vault for MemoryVault {
    fn documents(&self) -> Vec<DocumentId> {
        self.docs
            .read()
            .map(|docs| docs.keys().filter(|d| d.is_note()).cloned().collect())
            .unwrap_or_default()
    }

    fn header(&self, doc: &DocumentId) -> Option<Header> {
        self.docs.read().ok()?.get(doc).cloned().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_document_id_normalizes_separators() {
        assert_eq!(DocumentId::new("Projects\\Work\\memo.md").as_str(), "Projects/Work/memo.md");
    }

    #[test]
    fn test_document_id_from_path() {
        let root = PathBuf::from("/vault");
        let id = DocumentId::from_path(&root, &PathBuf::from("/vault/Projects/note.md"));
        assert_eq!(id, Some(DocumentId::new("Projects/note.md")));
        assert_eq!(DocumentId::from_path(&root, &PathBuf::from("/elsewhere/note.md")), None);
        assert_eq!(DocumentId::from_path(&root, &root), None);
    }

    #[test]
    fn test_recognizes_notes() {
        assert!(DocumentId::new("note.md").is_note());
        assert!(DocumentId::new("Projects/Work/memo.md").is_note());
        // a note may itself be named like an attachment folder
        assert!(DocumentId::new("Projects/old_att.md").is_note());
    }

    #[test]
    fn test_rejects_non_notes() {
        assert!(!DocumentId::new("image.png").is_note());
        assert!(!DocumentId::new("note.md.notology-tmp").is_note());
        assert!(!DocumentId::new(".notology/cache.md").is_note());
        assert!(!DocumentId::new("Note_att/embedded.md").is_note());
        assert!(!DocumentId::new("Projects/.hidden.md").is_note());
    }

    #[test]
    fn test_memory_vault_lists_only_notes_sorted() {
        let vault = MemoryVault::new();
        vault.insert("b.md", None);
        vault.insert("a.md", None);
        vault.insert("pic.png", None);
        assert_eq!(vault.documents(), vec![DocumentId::new("a.md"), DocumentId::new("b.md")]);
    }

    #[test]
    fn test_memory_vault_rename_keeps_header() {
        let vault = MemoryVault::new();
        vault.insert_markdown("a.md", "---\ntitle: A\n---\n");
        assert!(vault.rename(&DocumentId::new("a.md"), "z.md"));
        assert!(vault.header(&DocumentId::new("a.md")).is_none());
        assert!(vault.header(&DocumentId::new("z.md")).is_some());
    }

    #[test]
    fn test_memory_vault_unparseable_header_is_none() {
        let vault = MemoryVault::new();
        vault.insert_markdown("bad.md", "---\ntitle: [oops\n---\n");
        assert!(vault.documents().contains(&DocumentId::new("bad.md")));
        assert!(vault.header(&DocumentId::new("bad.md")).is_none());
    }
}
