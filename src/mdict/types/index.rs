//! The in-memory key index built when a container is opened.

use std::collections::HashMap;

use regex::Regex;

use super::error::Result;
use super::models::{KeyEntry, RecordLocator};

/// One key of the index with its resolved record location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: KeyEntry,
    pub locator: RecordLocator,
}

/// Ordered key list plus a text → entry map.
///
/// The format allows the same key text to appear more than once. The map
/// keeps the last occurrence; [`Index::get_all`] returns every occurrence in
/// key-list order.
#[derive(Debug, Clone, Default)]
pub struct Index {
    entries: Vec<IndexEntry>,
    by_key: HashMap<String, usize>,
}

impl Index {
    /// Pairs each key with its locator. Both slices must be in key-list order.
    pub fn new(keys: Vec<KeyEntry>, locators: Vec<RecordLocator>) -> Self {
        let entries: Vec<IndexEntry> = keys
            .into_iter()
            .zip(locators)
            .map(|(key, locator)| IndexEntry { key, locator })
            .collect();

        let mut by_key = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            by_key.insert(entry.key.text.clone(), i);
        }

        Self { entries, by_key }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// Map lookup; the last entry wins when a key is duplicated.
    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.by_key.get(key).map(|&i| &self.entries[i])
    }

    /// Every entry whose text equals `key`, in key-list order.
    pub fn get_all(&self, key: &str) -> Vec<&IndexEntry> {
        if !self.contains(key) {
            return Vec::new();
        }
        self.entries.iter().filter(|e| e.key.text == key).collect()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Linear regex scan over the key list; returns the first `limit` matching
    /// keys in key-list order.
    pub fn search(&self, pattern: &str, limit: usize) -> Result<Vec<String>> {
        let re = Regex::new(pattern)?;
        Ok(self
            .entries
            .iter()
            .filter(|e| re.is_match(&e.key.text))
            .take(limit)
            .map(|e| e.key.text.clone())
            .collect())
    }
}
