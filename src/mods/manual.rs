//! Manual-page discovery for loadable units
//!
//! A unit may ship documentation in a sibling `<unitfile>.manual/`
//! directory holding `*.man` sources, nested arbitrarily. The actual
//! parsing and indexing is the manual indexer collaborator's job; this
//! module only finds the pages and surfaces indexing failures.

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Manual/help-page indexer collaborator
pub trait ManualIndexer: Send + Sync {
    /// Parse and index one manual page.
    ///
    /// # Errors
    /// Returns an error when the page is malformed; the caller aborts
    /// the unit's finalization.
    fn index_page(&self, page: &Path) -> Result<()>;

    /// Drop every indexed page contributed by `unit_file`
    fn remove_unit(&self, unit_file: &str);
}

/// Indexer that accepts every page and indexes nothing. Default wiring
/// until a real help system is attached.
#[derive(Default)]
pub struct NullManualIndexer;

impl ManualIndexer for NullManualIndexer {
    fn index_page(&self, _page: &Path) -> Result<()> {
        Ok(())
    }

    fn remove_unit(&self, _unit_file: &str) {}
}

/// Sibling manual directory for a unit: `<unitfile>.manual/`
#[must_use]
pub fn manual_dir_for(unit: &Path) -> Option<PathBuf> {
    let file_name = unit.file_name()?.to_str()?;
    Some(unit.with_file_name(format!("{file_name}.manual")))
}

/// Recursively collect `*.man` pages under `dir`, sorted for
/// deterministic indexing order.
///
/// # Errors
/// Returns an error when a directory cannot be read.
pub fn collect_man_pages(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut pages = Vec::new();
    walk(dir, &mut pages)?;
    pages.sort();
    Ok(pages)
}

fn walk(dir: &Path, pages: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, pages)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("man") {
            pages.push(path);
        }
    }
    Ok(())
}
