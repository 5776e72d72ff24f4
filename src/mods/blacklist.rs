//! Persisted unit blacklist
//!
//! A de-duplicated ordered list of normalized unit paths, serialized as
//! one `;`-joined string under a well-known key in the external
//! configuration store. Read on demand, rewritten wholesale on every
//! add or remove.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::config::store::KeyValueStore;
use crate::mods::loader::normalize_unit_path;

/// Configuration key holding the serialized blacklist
pub const BLACKLIST_KEY: &str = "mods.blacklist";

/// Separator joining entries in the persisted value
pub const BLACKLIST_SEPARATOR: char = ';';

/// Blacklist store over the injected key-value collaborator
pub struct Blacklist {
    store: Arc<dyn KeyValueStore>,
}

impl Blacklist {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Current entries, in persisted order, de-duplicated
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        let Some(raw) = self.store.get(BLACKLIST_KEY) else {
            return Vec::new();
        };
        let mut entries = Vec::new();
        for piece in raw.split(BLACKLIST_SEPARATOR) {
            let piece = piece.trim();
            if !piece.is_empty() && !entries.iter().any(|e| e == piece) {
                entries.push(piece.to_string());
            }
        }
        entries
    }

    #[must_use]
    pub fn contains(&self, unit: &Path) -> bool {
        let normalized = normalize_unit_path(unit);
        self.entries().iter().any(|e| *e == normalized)
    }

    /// Add a unit path; a no-op when already present.
    ///
    /// # Errors
    /// Returns an error if the store cannot persist the new value.
    pub fn add(&self, unit: &Path) -> Result<()> {
        let normalized = normalize_unit_path(unit);
        let mut entries = self.entries();
        if entries.iter().any(|e| *e == normalized) {
            return Ok(());
        }
        entries.push(normalized);
        self.persist(&entries)
    }

    /// Remove a unit path; a no-op when absent.
    ///
    /// # Errors
    /// Returns an error if the store cannot persist the new value.
    pub fn remove(&self, unit: &Path) -> Result<()> {
        let normalized = normalize_unit_path(unit);
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|e| *e != normalized);
        if entries.len() == before {
            return Ok(());
        }
        self.persist(&entries)
    }

    fn persist(&self, entries: &[String]) -> Result<()> {
        let joined = entries.join(&BLACKLIST_SEPARATOR.to_string());
        self.store.set(BLACKLIST_KEY, &joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::store::MemoryStore;
    use std::path::PathBuf;

    fn blacklist() -> Blacklist {
        Blacklist::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_empty_by_default() {
        assert!(blacklist().entries().is_empty());
    }

    #[test]
    fn test_add_then_contains() {
        let bl = blacklist();
        let unit = PathBuf::from("/mods/demo.so");
        bl.add(&unit).unwrap();
        assert!(bl.contains(&unit));
        assert!(!bl.contains(Path::new("/mods/other.so")));
    }

    #[test]
    fn test_add_is_idempotent() {
        let bl = blacklist();
        let unit = PathBuf::from("/mods/demo.so");
        bl.add(&unit).unwrap();
        bl.add(&unit).unwrap();
        assert_eq!(bl.entries().len(), 1);
    }

    #[test]
    fn test_add_remove_round_trip() {
        let bl = blacklist();
        let keeper = PathBuf::from("/mods/keep.so");
        let transient = PathBuf::from("/mods/transient.so");

        bl.add(&keeper).unwrap();
        let before = bl.entries();

        bl.add(&transient).unwrap();
        bl.remove(&transient).unwrap();

        assert_eq!(bl.entries(), before);
    }

    #[test]
    fn test_persisted_value_is_delimiter_joined() {
        let store = Arc::new(MemoryStore::new());
        let bl = Blacklist::new(store.clone());
        bl.add(Path::new("/mods/a.so")).unwrap();
        bl.add(Path::new("/mods/b.so")).unwrap();
        assert_eq!(
            store.get(BLACKLIST_KEY).as_deref(),
            Some("/mods/a.so;/mods/b.so")
        );
    }
}
