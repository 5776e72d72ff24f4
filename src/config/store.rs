//! Key-value configuration store collaborator
//!
//! The blacklist (and anything else the host persists outside the main
//! config file) goes through this trait. The file-backed implementation
//! rewrites the whole document on every set, matching the store's
//! read-on-demand, rewrite-wholesale contract.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Minimal key-value persistence contract
pub trait KeyValueStore: Send + Sync {
    /// Read one value; `None` when the key was never written
    fn get(&self, key: &str) -> Option<String>;

    /// Write one value, persisting immediately.
    ///
    /// # Errors
    /// Returns an error if the value cannot be persisted.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// YAML-file-backed store: a flat string map serialized with serde_yaml
pub struct YamlStore {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl YamlStore {
    /// Open (or create on first write) the store at `path`
    ///
    /// # Errors
    /// Returns an error if an existing file cannot be read or parsed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read store file '{}'", path.display()))?;
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse store file '{}'", path.display()))?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    fn persist(&self, values: &HashMap<String, String>) -> Result<()> {
        let contents = serde_yaml::to_string(values).context("Failed to serialize store")?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create store directory")?;
        }
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write store file '{}'", self.path.display()))
    }
}

impl KeyValueStore for YamlStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = match self.values.lock() {
            Ok(values) => values,
            Err(poisoned) => poisoned.into_inner(),
        };
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = match self.values.lock() {
            Ok(values) => values,
            Err(poisoned) => poisoned.into_inner(),
        };
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }
}

/// In-memory store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = match self.values.lock() {
            Ok(values) => values,
            Err(poisoned) => poisoned.into_inner(),
        };
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = match self.values.lock() {
            Ok(values) => values,
            Err(poisoned) => poisoned.into_inner(),
        };
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
