//! Install and uninstall surface for unit files
//!
//! Install copies a unit into the mods directory (stopping a running
//! unit of the same name first) along with its manual sibling
//! directory. Uninstall performs the mirror operation and asks the
//! manual indexer to drop the unit's indexed pages.

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::{info, warn};

use crate::mods::lifecycle::LifecycleManager;
use crate::mods::manual::manual_dir_for;

impl LifecycleManager {
    /// Copy `source` into the mods directory, replacing (and first
    /// stopping) any unit of the same name, and copy its manual sibling
    /// directory when present. The unit is not started; callers decide
    /// when to load it.
    ///
    /// # Errors
    /// Returns an error when the copy fails or `source` is not a file.
    pub fn install(&self, source: &Path) -> Result<()> {
        if !source.is_file() {
            bail!("'{}' is not a unit file", source.display());
        }
        let file_name = source
            .file_name()
            .context("Unit path has no file name")?
            .to_string_lossy()
            .into_owned();

        std::fs::create_dir_all(self.mods_dir()).with_context(|| {
            format!("Failed to create mods directory '{}'", self.mods_dir().display())
        })?;

        let dest = self.mods_dir().join(&file_name);
        if dest.exists() {
            info!("Replacing installed unit '{file_name}'");
            self.stop(&file_name);
        }
        std::fs::copy(source, &dest)
            .with_context(|| format!("Failed to copy unit to '{}'", dest.display()))?;

        if let Some(manual_src) = manual_dir_for(source) {
            if manual_src.is_dir() {
                let manual_dest = self.mods_dir().join(format!("{file_name}.manual"));
                copy_dir(&manual_src, &manual_dest).with_context(|| {
                    format!("Failed to copy manual directory '{}'", manual_src.display())
                })?;
            }
        }

        info!("Installed unit '{file_name}'");
        Ok(())
    }

    /// Stop and remove an installed unit, its manual directory, and its
    /// indexed manual pages. Missing pieces are reported, not fatal.
    ///
    /// # Errors
    /// Returns an error when the unit file exists but cannot be removed.
    pub fn uninstall(&self, unit_file: &str) -> Result<()> {
        self.stop(unit_file);

        let unit = self.mods_dir().join(unit_file);
        if unit.exists() {
            std::fs::remove_file(&unit)
                .with_context(|| format!("Failed to remove unit '{}'", unit.display()))?;
        } else {
            warn!("Unit '{unit_file}' was not installed");
        }

        let manual = self.mods_dir().join(format!("{unit_file}.manual"));
        if manual.is_dir() {
            if let Err(e) = std::fs::remove_dir_all(&manual) {
                warn!("Failed to remove manual directory '{}': {e}", manual.display());
            }
        }
        self.manual_indexer().remove_unit(unit_file);

        info!("Uninstalled unit '{unit_file}'");
        Ok(())
    }
}

fn copy_dir(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
