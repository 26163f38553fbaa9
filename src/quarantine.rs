//! Quarantine store
//!
//! Durable mapping of test name (or substring pattern) to the free-text
//! reason it was quarantined, persisted as pretty JSON (default
//! `tests/flaky_quarantine.json`). Keys starting with `_` are metadata:
//! they ride along in the file but are never matched against test names
//! and never eligible for rehabilitation.
//!
//! Loading is best-effort by design - a missing or corrupt store must never
//! block a test run, so it degrades to "nothing quarantined" with a console
//! warning. Writers load the whole mapping, mutate it in memory, and save
//! the whole mapping back; there are no partial or merge writes.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::fs;
use std::path::Path;

use crate::util::write_atomic;

/// Reserved prefix marking a key as metadata rather than a test pattern.
pub const METADATA_PREFIX: &str = "_";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuarantineStore {
    entries: IndexMap<String, String>,
}

impl QuarantineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: IndexMap<String, String>) -> Self {
        Self { entries }
    }

    /// Load the store from `path`. Fails soft: an absent or unparsable file
    /// yields an empty store plus a warning, never an error.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                eprintln!(
                    "  Warning: could not load quarantine file '{}': {}",
                    path.display(),
                    err
                );
                return Self::new();
            }
        };

        match serde_json::from_str::<IndexMap<String, String>>(&content) {
            Ok(entries) => Self { entries },
            Err(err) => {
                eprintln!(
                    "  Warning: quarantine file '{}' is not valid JSON ({}); treating as empty",
                    path.display(),
                    err
                );
                Self::new()
            }
        }
    }

    /// Persist the whole mapping as pretty JSON, key order preserved.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.entries)
            .context("Failed to serialize quarantine store")?;
        write_atomic(path, &content)
            .with_context(|| format!("Failed to save quarantine file '{}'", path.display()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn insert(&mut self, key: impl Into<String>, reason: impl Into<String>) {
        self.entries.insert(key.into(), reason.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        // shift_remove keeps the insertion order of the survivors intact
        self.entries.shift_remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Non-metadata entries, in insertion order.
    pub fn candidates(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter(|(key, _)| !is_metadata(key))
            .map(|(key, reason)| (key.as_str(), reason.as_str()))
    }

    /// Metadata entries (reserved `_` prefix), in insertion order.
    pub fn metadata(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter(|(key, _)| is_metadata(key))
            .map(|(key, reason)| (key.as_str(), reason.as_str()))
    }

    /// Reason a declared test name is quarantined, if any.
    ///
    /// Exact key match wins first; otherwise the first non-metadata key (in
    /// insertion order) contained in `test_name` as a substring wins. A key
    /// shared as a substring by unrelated tests therefore shadows all of
    /// them - callers relying on order must mind what they insert first.
    pub fn match_reason(&self, test_name: &str) -> Option<&str> {
        if !is_metadata(test_name) {
            if let Some(reason) = self.entries.get(test_name) {
                return Some(reason);
            }
        }
        self.candidates()
            .find(|(key, _)| test_name.contains(key))
            .map(|(_, reason)| reason)
    }
}

pub fn is_metadata(key: &str) -> bool {
    key.starts_with(METADATA_PREFIX)
}
