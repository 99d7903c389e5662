use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors surfaced by the history store.
///
/// A missing or unreadable-as-JSON file is not an error (it loads as an
/// empty store); only real I/O failures and serialization failures reach
/// the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access history file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ============================================================================
// Data Structures
// ============================================================================

/// One published strip for one author on one date.
///
/// Field names are the on-disk JSON keys. `image_length` is kept as the
/// decimal string the remote reports (`"0"` when unknown).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComicRecord {
    pub title: String,
    pub image_url: String,
    pub image_mime_type: String,
    pub image_length: String,
    /// `YYYY/MM/DD`
    pub date: String,
}

/// Per-author comic history, in fetch order.
///
/// Backed by an [`IndexMap`] so authors serialize (and render into the feed)
/// in the order they were first written, which keeps repeated saves of the
/// same logical content byte-identical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryStore {
    authors: IndexMap<String, Vec<ComicRecord>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no author has any record.
    ///
    /// Authors with an empty list count as empty, matching how backfill
    /// decides whether this is a first run.
    pub fn is_empty(&self) -> bool {
        self.authors.values().all(Vec::is_empty)
    }

    /// Records stored for `author`, if the author has ever been written.
    pub fn records(&self, author: &str) -> Option<&[ComicRecord]> {
        self.authors.get(author.trim()).map(Vec::as_slice)
    }

    /// Whether `author` already has a record for `date`.
    pub fn contains(&self, author: &str, date: &str) -> bool {
        self.records(author)
            .is_some_and(|records| records.iter().any(|r| r.date == date))
    }

    /// Append a record for `author` unless one for the same date exists.
    ///
    /// Returns `true` when the record was added. The author entry is created
    /// on first insert.
    pub fn insert(&mut self, author: &str, record: ComicRecord) -> bool {
        let records = self.authors.entry(author.trim().to_string()).or_default();
        if records.iter().any(|r| r.date == record.date) {
            return false;
        }
        records.push(record);
        true
    }

    /// Iterate `(author, records)` in store order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ComicRecord])> {
        self.authors
            .iter()
            .map(|(author, records)| (author.as_str(), records.as_slice()))
    }

    /// Total number of records across all authors.
    pub fn record_count(&self) -> usize {
        self.authors.values().map(Vec::len).sum()
    }

    /// Trim author keys, merging entries that collide after trimming.
    ///
    /// The first record seen for a date wins; order is otherwise kept.
    pub(super) fn normalize_author_keys(&mut self) {
        if self.authors.keys().all(|author| author.trim() == author) {
            return;
        }

        let mut normalized: IndexMap<String, Vec<ComicRecord>> = IndexMap::new();
        for (author, records) in std::mem::take(&mut self.authors) {
            let merged = normalized.entry(author.trim().to_string()).or_default();
            for record in records {
                if !merged.iter().any(|r| r.date == record.date) {
                    merged.push(record);
                }
            }
        }
        self.authors = normalized;
    }

    /// Keep only the records for which `keep` returns true.
    ///
    /// Author entries are kept even when they end up empty. Returns the
    /// number of records removed.
    pub fn retain_records<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&ComicRecord) -> bool,
    {
        let mut removed = 0;
        for records in self.authors.values_mut() {
            let before = records.len();
            records.retain(|r| keep(r));
            removed += before - records.len();
        }
        removed
    }
}

// ============================================================================
// Tests
// ============================================================================
