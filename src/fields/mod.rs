pub mod stats;
pub mod watcher;

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::frontmatter::flatten::{flatten, FlatField};
use crate::frontmatter::types::Header;
use crate::vault::{DocumentId, Vault};
use stats::{ValueStats, ValueTally, TOP_VALUES_LIMIT};

/// Progress sink for full rebuilds, called with the percentage completed (0-100)
pub type ProgressFn<'a> = &'a (dyn Fn(u8) + Send + Sync);

/// Settings that decide which fields and stats the index derives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOptions {
    pub ignore_fields: BTreeSet<String>,
    pub analyze_values: bool,
}

/// Aggregate for one flattened field name across the vault
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRecord {
    pub name: String,
    pub document_count: usize,
    pub owning_documents: BTreeSet<DocumentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_stats: Option<ValueStats>,
}

impl FieldRecord {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            document_count: 0,
            owning_documents: BTreeSet::new(),
            value_stats: None,
        }
    }

    fn add_document(&mut self, doc: &DocumentId) {
        self.owning_documents.insert(doc.clone());
        self.document_count = self.owning_documents.len();
    }

    fn remove_document(&mut self, doc: &DocumentId) {
        self.owning_documents.remove(doc);
        self.document_count = self.owning_documents.len();
    }
}

struct FieldEntry {
    record: FieldRecord,
    // Discovery sequence, breaks count ties in `fields()`
    discovered: u64,
}

/// Per-field index of which notes declare which frontmatter fields.
///
/// Every note's flattened fields are retained (`contributions`), so removing or
/// renaming a note only touches the records it contributed to.
pub struct FieldIndex {
    options: IndexOptions,
    records: HashMap<String, FieldEntry>,
    contributions: HashMap<DocumentId, Vec<FlatField>>,
    next_discovery: u64,
    last_refreshed: Option<DateTime<Utc>>,
}

impl FieldIndex {
    pub fn new(options: IndexOptions) -> Self {
        Self {
            options,
            records: HashMap::new(),
            contributions: HashMap::new(),
            next_discovery: 0,
            last_refreshed: None,
        }
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// Time of the last full rebuild, `None` until built or after `invalidate`
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed
    }

    pub fn is_populated(&self) -> bool {
        self.last_refreshed.is_some()
    }

    /// A cache hit needs records and a rebuild younger than the TTL
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl_secs: u64) -> bool {
        if self.records.is_empty() {
            return false;
        }
        let secs = i64::try_from(ttl_secs).unwrap_or(i64::MAX).min(i64::MAX / 1000);
        let ttl = Duration::seconds(secs);
        match self.last_refreshed {
            Some(refreshed) => now.signed_duration_since(refreshed) < ttl,
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Documents that contribute at least one field
    pub fn document_count(&self) -> usize {
        self.contributions.values().filter(|fields| !fields.is_empty()).count()
    }

    /// Every note the index knows about, including those without fields
    pub fn tracked_count(&self) -> usize {
        self.contributions.len()
    }

    pub fn record(&self, name: &str) -> Option<&FieldRecord> {
        self.records.get(name).map(|entry| &entry.record)
    }

    /// Records sorted by document count, most common first; ties keep discovery order
    pub fn fields(&self) -> Vec<FieldRecord> {
        let mut entries: Vec<&FieldEntry> = self.records.values().collect();
        entries.sort_by(|a, b| {
            b.record
                .document_count
                .cmp(&a.record.document_count)
                .then(a.discovered.cmp(&b.discovered))
        });
        entries.into_iter().map(|entry| entry.record.clone()).collect()
    }

    /// Drop everything; the next read rebuilds
    pub fn invalidate(&mut self) {
        self.records.clear();
        self.contributions.clear();
        self.next_discovery = 0;
        self.last_refreshed = None;
    }

    /// Synchronous rebuild for unit tests; the controller runs the async one
    #[cfg(test)]
    pub(crate) fn rebuild(
        &mut self,
        vault: &dyn Vault,
        now: DateTime<Utc>,
        progress: Option<ProgressFn<'_>>,
    ) -> usize {
        let start = std::time::Instant::now();
        let docs = vault.documents();
        let total = docs.len();
        let mut fresh = FieldIndex::new(self.options.clone());

        for (i, doc) in docs.iter().enumerate() {
            let header = vault.header(doc);
            fresh.ingest(doc, header.as_ref());
            if let Some(report) = progress {
                report(percent(i + 1, total));
            }
        }
        if total == 0 {
            if let Some(report) = progress {
                report(100);
            }
        }

        fresh.finish_rebuild(now);
        log::info!(
            "[FieldIndex] Rebuilt {} fields from {} documents in {:?}",
            fresh.len(),
            total,
            start.elapsed()
        );
        *self = fresh;
        self.document_count()
    }

    /// Add one document during a rebuild. Stats are computed in `finish_rebuild`.
    pub(crate) fn ingest(&mut self, doc: &DocumentId, header: Option<&Header>) {
        if !doc.is_note() {
            return;
        }
        self.remove_contribution(doc);
        let fields = self.contribution(header).unwrap_or_else(|e| {
            log::warn!("[FieldIndex] Skipping {}: {}", doc, e);
            Vec::new()
        });
        self.add_contribution(doc, fields);
    }

    pub(crate) fn finish_rebuild(&mut self, now: DateTime<Utc>) {
        if self.options.analyze_values {
            let keys: Vec<String> = self.records.keys().cloned().collect();
            self.recompute_stats(keys);
        }
        self.last_refreshed = Some(now);
    }

    /// A note appeared. Firing twice for an unchanged note is the same as once.
    pub fn apply_created(&mut self, vault: &dyn Vault, doc: &DocumentId) -> bool {
        if !self.accepts(doc) {
            return false;
        }
        log::debug!("[FieldIndex] Created: {}", doc);
        self.readd(vault, doc);
        true
    }

    /// A note's content changed: drop its old fields, then add it again
    pub fn apply_changed(&mut self, vault: &dyn Vault, doc: &DocumentId) -> bool {
        if !self.accepts(doc) {
            return false;
        }
        log::debug!("[FieldIndex] Changed: {}", doc);
        self.readd(vault, doc);
        true
    }

    pub fn apply_deleted(&mut self, doc: &DocumentId) -> bool {
        if !self.accepts(doc) {
            return false;
        }
        log::debug!("[FieldIndex] Deleted: {}", doc);
        let touched = self.remove_contribution(doc);
        self.recompute_stats(touched);
        true
    }

    /// Re-key a note without re-reading its header
    pub fn apply_renamed(&mut self, vault: &dyn Vault, from: &DocumentId, to: &DocumentId) -> bool {
        if !self.is_populated() {
            return false;
        }
        match (from.is_note(), to.is_note()) {
            (false, false) => return false,
            (true, false) => return self.apply_deleted(from),
            (false, true) => return self.apply_created(vault, to),
            (true, true) => {}
        }
        if from == to {
            return true;
        }
        log::debug!("[FieldIndex] Renamed: {} -> {}", from, to);

        // Whatever was indexed under the target name is stale now
        let mut touched = self.remove_contribution(to);

        let Some(fields) = self.contributions.remove(from) else {
            // Unknown source: index the target as a new note
            self.readd(vault, to);
            self.recompute_stats(touched);
            return true;
        };

        for field in &fields {
            if let Some(entry) = self.records.get_mut(&field.key) {
                entry.record.remove_document(from);
                entry.record.add_document(to);
            }
            touched.push(field.key.clone());
        }
        self.contributions.insert(to.clone(), fields);
        self.recompute_stats(touched);
        true
    }

    /// Check the count and membership invariants against the retained contributions
    pub fn check_invariants(&self) -> Result<(), String> {
        for (name, entry) in &self.records {
            let record = &entry.record;
            if record.name != *name {
                return Err(format!("Record keyed '{}' is named '{}'", name, record.name));
            }
            if record.document_count != record.owning_documents.len() {
                return Err(format!(
                    "Field '{}' counts {} but owns {} documents",
                    name,
                    record.document_count,
                    record.owning_documents.len()
                ));
            }
            if record.document_count == 0 {
                return Err(format!("Field '{}' has no documents", name));
            }
            for doc in &record.owning_documents {
                let declares = self
                    .contributions
                    .get(doc)
                    .map(|fields| fields.iter().any(|f| f.key == *name))
                    .unwrap_or(false);
                if !declares {
                    return Err(format!("Field '{}' lists {} which does not declare it", name, doc));
                }
            }
            if self.options.analyze_values != record.value_stats.is_some() {
                return Err(format!("Field '{}' value stats do not match analysis mode", name));
            }
        }
        for (doc, fields) in &self.contributions {
            for field in fields {
                let owned = self
                    .records
                    .get(&field.key)
                    .map(|entry| entry.record.owning_documents.contains(doc))
                    .unwrap_or(false);
                if !owned {
                    return Err(format!("{} declares '{}' but is not listed", doc, field.key));
                }
            }
        }
        Ok(())
    }

    fn accepts(&self, doc: &DocumentId) -> bool {
        self.is_populated() && doc.is_note()
    }

    fn readd(&mut self, vault: &dyn Vault, doc: &DocumentId) {
        let mut touched = self.remove_contribution(doc);
        let header = vault.header(doc);
        let fields = self.contribution(header.as_ref()).unwrap_or_else(|e| {
            log::warn!("[FieldIndex] Skipping {}: {}", doc, e);
            Vec::new()
        });
        touched.extend(self.add_contribution(doc, fields));
        self.recompute_stats(touched);
    }

    /// Flattened fields of one header minus ignored names, each key once
    fn contribution(&self, header: Option<&Header>) -> Result<Vec<FlatField>, String> {
        let Some(header) = header else {
            return Ok(Vec::new());
        };
        let mut seen = HashSet::new();
        Ok(flatten(header)?
            .into_iter()
            .filter(|field| !self.options.ignore_fields.contains(&field.key))
            .filter(|field| seen.insert(field.key.clone()))
            .collect())
    }

    /// Record what `doc` contributes. An empty list is kept too, so the note
    /// stays known for renames.
    fn add_contribution(&mut self, doc: &DocumentId, fields: Vec<FlatField>) -> Vec<String> {
        let mut keys = Vec::with_capacity(fields.len());
        for field in &fields {
            let next_discovery = &mut self.next_discovery;
            let entry = self.records.entry(field.key.clone()).or_insert_with(|| {
                let discovered = *next_discovery;
                *next_discovery += 1;
                FieldEntry {
                    record: FieldRecord::new(&field.key),
                    discovered,
                }
            });
            entry.record.add_document(doc);
            keys.push(field.key.clone());
        }
        self.contributions.insert(doc.clone(), fields);
        keys
    }

    /// Remove a document from every record it contributed to.
    /// Records left without documents are deleted.
    fn remove_contribution(&mut self, doc: &DocumentId) -> Vec<String> {
        let Some(fields) = self.contributions.remove(doc) else {
            return Vec::new();
        };
        let mut keys = Vec::with_capacity(fields.len());
        for field in fields {
            if let Some(entry) = self.records.get_mut(&field.key) {
                entry.record.remove_document(doc);
                if entry.record.document_count == 0 {
                    self.records.remove(&field.key);
                }
            }
            keys.push(field.key);
        }
        keys
    }

    /// Recompute value stats of the given fields from their owning documents.
    /// Documents are visited in id order, the same order a rebuild folds them in.
    fn recompute_stats(&mut self, keys: Vec<String>) {
        if !self.options.analyze_values {
            return;
        }
        let unique: BTreeSet<String> = keys.into_iter().collect();
        for key in unique {
            let Some(entry) = self.records.get_mut(&key) else {
                continue;
            };
            let mut tally = ValueTally::new();
            for doc in &entry.record.owning_documents {
                let value = self
                    .contributions
                    .get(doc)
                    .and_then(|fields| fields.iter().find(|f| f.key == key));
                if let Some(field) = value {
                    tally.fold(&field.value);
                }
            }
            entry.record.value_stats = Some(tally.finish(TOP_VALUES_LIMIT));
        }
    }
}

pub(crate) fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}

/// Slice one page of fields for display; pages are zero-based
pub fn paginate(fields: &[FieldRecord], page_size: usize, page: usize) -> &[FieldRecord] {
    let page_size = page_size.max(1);
    let start = page.saturating_mul(page_size).min(fields.len());
    let end = start.saturating_add(page_size).min(fields.len());
    &fields[start..end]
}

pub fn page_count(total: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    total.div_ceil(page_size).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::MemoryVault;
    use chrono::TimeZone;
    use std::sync::Mutex;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 24, 12, 0, 0).unwrap()
    }

    fn vault(notes: &[(&str, &str)]) -> MemoryVault {
        let vault = MemoryVault::new();
        for (path, content) in notes {
            vault.insert_markdown(*path, content);
        }
        vault
    }

    fn built(vault: &MemoryVault, options: IndexOptions) -> FieldIndex {
        let mut index = FieldIndex::new(options);
        index.rebuild(vault, t0(), None);
        index
    }

    fn docs(record: &FieldRecord) -> Vec<&str> {
        record.owning_documents.iter().map(|d| d.as_str()).collect()
    }

    #[test]
    fn test_rebuild_counts_documents_per_field() {
        let vault = vault(&[
            ("a.md", "---\ntags: [x, y]\nauthor:\n  name: Bob\n---\n"),
            ("b.md", "---\ntags: [z]\n---\n"),
            ("c.md", "no header"),
        ]);
        let index = built(&vault, IndexOptions::default());
        index.check_invariants().unwrap();

        let fields = index.fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "tags");
        assert_eq!(fields[0].document_count, 2);
        assert_eq!(docs(&fields[0]), vec!["a.md", "b.md"]);
        assert_eq!(fields[1].name, "author.name");
        assert_eq!(docs(&fields[1]), vec!["a.md"]);
        assert!(fields[0].value_stats.is_none());
    }

    #[test]
    fn test_ties_keep_discovery_order() {
        let vault = vault(&[("a.md", "---\nzeta: 1\nalpha: 2\nmid: 3\n---\n")]);
        let index = built(&vault, IndexOptions::default());
        let names: Vec<String> = index.fields().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_ignored_fields_are_excluded() {
        let vault = vault(&[("a.md", "---\ntitle: A\nauthor:\n  name: Bob\n---\n")]);
        let options = IndexOptions {
            ignore_fields: ["title".to_string(), "author.name".to_string()].into_iter().collect(),
            analyze_values: false,
        };
        let index = built(&vault, options);
        assert!(index.is_empty());
    }

    #[test]
    fn test_value_analysis_on_rebuild() {
        let notes: Vec<(String, String)> = ["done", "pending", "done", "done", "pending"]
            .iter()
            .enumerate()
            .map(|(i, s)| (format!("n{}.md", i), format!("---\nstatus: {}\n---\n", s)))
            .collect();
        let vault = MemoryVault::new();
        for (path, content) in &notes {
            vault.insert_markdown(path.as_str(), content);
        }
        let index = built(&vault, IndexOptions { analyze_values: true, ..Default::default() });

        let stats = index.record("status").unwrap().value_stats.clone().unwrap();
        assert_eq!(stats.unique_value_count, 2);
        let top: Vec<(&str, usize)> =
            stats.top_values.iter().map(|v| (v.value.as_str(), v.count)).collect();
        assert_eq!(top, vec![("done", 3), ("pending", 2)]);
    }

    #[test]
    fn test_progress_reports_each_document() {
        let vault = vault(&[("a.md", "x"), ("b.md", "y"), ("c.md", "z"), ("d.md", "w")]);
        let seen = Mutex::new(Vec::new());
        let report = |p: u8| seen.lock().unwrap().push(p);
        let mut index = FieldIndex::new(IndexOptions::default());
        index.rebuild(&vault, t0(), Some(&report));
        assert_eq!(*seen.lock().unwrap(), vec![25, 50, 75, 100]);
    }

    #[test]
    fn test_progress_on_empty_vault() {
        let vault = MemoryVault::new();
        let seen = Mutex::new(Vec::new());
        let report = |p: u8| seen.lock().unwrap().push(p);
        let mut index = FieldIndex::new(IndexOptions::default());
        index.rebuild(&vault, t0(), Some(&report));
        assert_eq!(*seen.lock().unwrap(), vec![100]);
    }

    #[test]
    fn test_freshness_follows_ttl() {
        let vault = vault(&[("a.md", "---\ntitle: A\n---\n")]);
        let index = built(&vault, IndexOptions::default());
        assert!(index.is_fresh(t0(), 600));
        assert!(index.is_fresh(t0() + Duration::seconds(599), 600));
        assert!(!index.is_fresh(t0() + Duration::seconds(600), 600));
    }

    #[test]
    fn test_empty_index_is_never_fresh() {
        let index = built(&MemoryVault::new(), IndexOptions::default());
        assert!(index.is_populated());
        assert!(!index.is_fresh(t0(), 600));
    }

    #[test]
    fn test_invalidate_resets_state() {
        let vault = vault(&[("a.md", "---\ntitle: A\n---\n")]);
        let mut index = built(&vault, IndexOptions::default());
        index.invalidate();
        assert!(index.is_empty());
        assert!(index.last_refreshed().is_none());
        assert_eq!(index.document_count(), 0);
    }

    #[test]
    fn test_incremental_ops_wait_for_first_build() {
        let vault = vault(&[("a.md", "---\ntitle: A\n---\n")]);
        let mut index = FieldIndex::new(IndexOptions::default());
        assert!(!index.apply_created(&vault, &DocumentId::new("a.md")));
        assert!(index.is_empty());
    }

    #[test]
    fn test_changed_replaces_old_fields() {
        let vault = vault(&[("a.md", "---\nstatus: draft\ndue: 2025-02-01\n---\n")]);
        let mut index = built(&vault, IndexOptions::default());

        vault.insert_markdown("a.md", "---\nstatus: final\nreviewer: Kim\n---\n");
        assert!(index.apply_changed(&vault, &DocumentId::new("a.md")));
        index.check_invariants().unwrap();

        assert!(index.record("due").is_none());
        assert_eq!(index.record("status").unwrap().document_count, 1);
        assert_eq!(index.record("reviewer").unwrap().document_count, 1);
    }

    #[test]
    fn test_created_twice_is_idempotent() {
        let vault = vault(&[("a.md", "---\ntitle: A\n---\n")]);
        let mut index = built(&vault, IndexOptions { analyze_values: true, ..Default::default() });

        vault.insert_markdown("b.md", "---\ntitle: B\nstatus: done\n---\n");
        let doc = DocumentId::new("b.md");
        index.apply_created(&vault, &doc);
        let once = index.fields();
        index.apply_created(&vault, &doc);
        assert_eq!(index.fields(), once);
        assert_eq!(index.record("title").unwrap().document_count, 2);
        index.check_invariants().unwrap();
    }

    #[test]
    fn test_deleted_drops_empty_records() {
        let vault = vault(&[("a.md", "---\ntags: [x]\nonly_a: 1\n---\n"), ("b.md", "---\ntags: [z]\n---\n")]);
        let mut index = built(&vault, IndexOptions::default());

        vault.remove(&DocumentId::new("a.md"));
        assert!(index.apply_deleted(&DocumentId::new("a.md")));
        index.check_invariants().unwrap();
        assert!(index.record("only_a").is_none());
        assert_eq!(docs(index.record("tags").unwrap()), vec!["b.md"]);
    }

    #[test]
    fn test_renamed_moves_identity_without_rereading() {
        let vault = vault(&[("a.md", "---\nauthor:\n  name: Bob\n---\n")]);
        let mut index = built(&vault, IndexOptions::default());

        // The vault still answers with the old content for the new name on purpose:
        // a rename must not look at the header at all.
        vault.rename(&DocumentId::new("a.md"), "moved/a2.md");
        vault.insert_markdown("moved/a2.md", "---\nsomething: else\n---\n");
        assert!(index.apply_renamed(&vault, &DocumentId::new("a.md"), &DocumentId::new("moved/a2.md")));
        index.check_invariants().unwrap();

        let record = index.record("author.name").unwrap();
        assert_eq!(record.document_count, 1);
        assert_eq!(docs(record), vec!["moved/a2.md"]);
        assert!(index.record("something").is_none());
    }

    #[test]
    fn test_renamed_fieldless_note_is_not_reread() {
        let vault = vault(&[
            ("a.md", "---\nsecret: 1\n---\n"),
            ("plain.md", "no header"),
        ]);
        let options = IndexOptions {
            ignore_fields: ["secret".to_string()].into_iter().collect(),
            analyze_values: false,
        };
        let mut index = built(&vault, options);
        assert_eq!(index.tracked_count(), 2);
        assert_eq!(index.document_count(), 0);

        // The vault answers the new names with fields the old notes never had
        vault.insert_markdown("b.md", "---\nfresh: 1\n---\n");
        vault.insert_markdown("plain2.md", "---\nfresh: 2\n---\n");
        assert!(index.apply_renamed(&vault, &DocumentId::new("a.md"), &DocumentId::new("b.md")));
        assert!(index.apply_renamed(&vault, &DocumentId::new("plain.md"), &DocumentId::new("plain2.md")));
        index.check_invariants().unwrap();

        assert!(index.record("fresh").is_none(), "이름 변경만으로 헤더를 다시 읽으면 안 됨");
        assert_eq!(index.tracked_count(), 2);
    }

    #[test]
    fn test_renamed_over_existing_target() {
        let vault = vault(&[("a.md", "---\nfrom_a: 1\n---\n"), ("b.md", "---\nfrom_b: 1\n---\n")]);
        let mut index = built(&vault, IndexOptions::default());

        vault.remove(&DocumentId::new("b.md"));
        vault.rename(&DocumentId::new("a.md"), "b.md");
        index.apply_renamed(&vault, &DocumentId::new("a.md"), &DocumentId::new("b.md"));
        index.check_invariants().unwrap();

        assert!(index.record("from_b").is_none());
        assert_eq!(docs(index.record("from_a").unwrap()), vec!["b.md"]);
    }

    #[test]
    fn test_renamed_unknown_source_indexes_target() {
        let vault = vault(&[("a.md", "---\ntitle: A\n---\n")]);
        let mut index = built(&vault, IndexOptions::default());

        vault.insert_markdown("new.md", "---\ntitle: N\n---\n");
        index.apply_renamed(&vault, &DocumentId::new("ghost.md"), &DocumentId::new("new.md"));
        assert_eq!(index.record("title").unwrap().document_count, 2);
    }

    #[test]
    fn test_renamed_out_of_tracked_area_is_a_delete() {
        let vault = vault(&[("a.md", "---\ntitle: A\n---\n")]);
        let mut index = built(&vault, IndexOptions::default());

        vault.rename(&DocumentId::new("a.md"), ".trash/a.md");
        index.apply_renamed(&vault, &DocumentId::new("a.md"), &DocumentId::new(".trash/a.md"));
        assert!(index.is_empty());
        index.check_invariants().unwrap();
    }

    #[test]
    fn test_non_notes_are_ignored() {
        let vault = vault(&[("a.md", "---\ntitle: A\n---\n")]);
        let mut index = built(&vault, IndexOptions::default());
        assert!(!index.apply_created(&vault, &DocumentId::new("image.png")));
        assert!(!index.apply_deleted(&DocumentId::new("a_att/doc.md")));
        assert!(!index.apply_renamed(&vault, &DocumentId::new("x.txt"), &DocumentId::new("y.txt")));
        assert_eq!(index.record("title").unwrap().document_count, 1);
    }

    #[test]
    fn test_deleting_last_field_makes_cache_stale() {
        let vault = vault(&[("a.md", "---\ntitle: A\n---\n")]);
        let mut index = built(&vault, IndexOptions::default());
        index.apply_deleted(&DocumentId::new("a.md"));
        assert!(index.is_populated());
        assert!(!index.is_fresh(t0(), 600));
    }

    #[test]
    fn test_incremental_stats_follow_removals() {
        let vault = vault(&[
            ("a.md", "---\nstatus: done\n---\n"),
            ("b.md", "---\nstatus: done\n---\n"),
            ("c.md", "---\nstatus: pending\n---\n"),
        ]);
        let mut index = built(&vault, IndexOptions { analyze_values: true, ..Default::default() });

        vault.insert_markdown("a.md", "---\nstatus: pending\n---\n");
        index.apply_changed(&vault, &DocumentId::new("a.md"));
        index.apply_deleted(&DocumentId::new("b.md"));
        vault.remove(&DocumentId::new("b.md"));

        let stats = index.record("status").unwrap().value_stats.clone().unwrap();
        assert_eq!(stats.unique_value_count, 1);
        assert_eq!(stats.top_values[0].value, "pending");
        assert_eq!(stats.top_values[0].count, 2);
    }

    #[test]
    fn test_paginate() {
        let vault = vault(&[("a.md", "---\na: 1\nb: 2\nc: 3\nd: 4\ne: 5\n---\n")]);
        let index = built(&vault, IndexOptions::default());
        let fields = index.fields();

        assert_eq!(paginate(&fields, 2, 0).len(), 2);
        assert_eq!(paginate(&fields, 2, 2).len(), 1);
        assert!(paginate(&fields, 2, 9).is_empty());
        assert_eq!(page_count(fields.len(), 2), 3);
        assert_eq!(page_count(0, 50), 1);
    }
}
