//! Unit loader: opens a dynamic library, probes it for the capability
//! contract, and instantiates the mod script.
//!
//! The loader never touches shared registries; finalization is the
//! lifecycle manager's job. Loading independent units may therefore run
//! in parallel if the host chooses to.

use std::env::consts::DLL_EXTENSION;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use tracing::{debug, warn};

use crate::mods::api::{ModScript, ModScriptCreate, MOD_ENTRY_SYMBOL};
use crate::mods::error::{ModError, ModResult};

/// A live capability-contract object together with the library handles
/// that must stay resident while it exists.
///
/// Field order matters: the script drops before the libraries whose code
/// backs it.
pub struct ScriptInstance {
    script: Box<dyn ModScript>,
    _unit: Option<Library>,
    _deps: Vec<Library>,
}

impl ScriptInstance {
    /// Wrap an in-process script with no backing library. Used by host
    /// built-in scripts and by tests.
    #[must_use]
    pub fn in_process(script: Box<dyn ModScript>) -> Self {
        Self {
            script,
            _unit: None,
            _deps: Vec::new(),
        }
    }

    #[must_use]
    pub fn script(&self) -> &dyn ModScript {
        self.script.as_ref()
    }

    pub fn script_mut(&mut self) -> &mut dyn ModScript {
        self.script.as_mut()
    }
}

/// Result of attempting to load one unit
pub enum LoadOutcome {
    /// The unit implements the capability contract
    Script(ScriptInstance),
    /// The unit loaded but exposes no mod entry point; the caller may
    /// try alternate interpretations (e.g. a screensaver definition)
    NotAMod,
    /// Not a loadable unit at all (wrong extension); skipped silently
    Ignored,
}

/// Loads one unit identified by path. Injected into the lifecycle
/// manager so tests can substitute an in-process loader.
pub trait UnitLoader: Send + Sync {
    /// Attempt to load `unit`.
    ///
    /// # Errors
    /// Returns [`ModError::Load`] when the unit or one of its dependent
    /// libraries cannot be opened or instantiated.
    fn load(&self, unit: &Path) -> ModResult<LoadOutcome>;
}

/// Production loader backed by `libloading`
#[derive(Default)]
pub struct DylibLoader;

impl DylibLoader {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Load every library in the unit's private `Deps/<stem>-*/`
    /// sidecar directories, collecting per-library failure reasons.
    fn load_deps(unit: &Path, reasons: &mut Vec<String>) -> Vec<Library> {
        let mut deps = Vec::new();
        for dir in dep_dirs(unit) {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    reasons.push(format!("cannot read deps dir '{}': {e}", dir.display()));
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(DLL_EXTENSION) {
                    continue;
                }
                // Safety: same trust boundary as the unit itself; the
                // host runs mod code with its own privileges
                match unsafe { Library::new(&path) } {
                    Ok(lib) => {
                        debug!("Loaded dependent library: {}", path.display());
                        deps.push(lib);
                    }
                    Err(e) => reasons.push(format!(
                        "dependent library '{}' failed to load: {e}",
                        path.display()
                    )),
                }
            }
        }
        deps
    }
}

impl UnitLoader for DylibLoader {
    fn load(&self, unit: &Path) -> ModResult<LoadOutcome> {
        if unit.extension().and_then(|e| e.to_str()) != Some(DLL_EXTENSION) {
            debug!("Ignoring non-unit file: {}", unit.display());
            return Ok(LoadOutcome::Ignored);
        }

        // Dependent libraries first so the unit's own symbols resolve.
        // Each individual failure is kept and surfaced, not swallowed.
        let mut reasons = Vec::new();
        let deps = Self::load_deps(unit, &mut reasons);
        if !reasons.is_empty() {
            return Err(ModError::Load { reasons });
        }

        // Safety: loading and calling into the unit is the trust
        // boundary the host accepts; see the crate-level docs
        unsafe {
            let lib = match Library::new(unit) {
                Ok(lib) => lib,
                Err(e) => return Err(ModError::load(e.to_string())),
            };

            let constructor: Symbol<ModScriptCreate> = match lib.get(MOD_ENTRY_SYMBOL) {
                Ok(symbol) => symbol,
                Err(_) => {
                    debug!("No mod entry point in {}", unit.display());
                    return Ok(LoadOutcome::NotAMod);
                }
            };

            let script_ptr = constructor();
            if script_ptr.is_null() {
                return Err(ModError::load("mod entry point returned a null script"));
            }
            let script = Box::from_raw(script_ptr);
            drop(constructor);

            Ok(LoadOutcome::Script(ScriptInstance {
                script,
                _unit: Some(lib),
                _deps: deps,
            }))
        }
    }
}

/// Sidecar dependency directories for a unit: `Deps/<stem>-<version>/`
/// siblings. The declared version is unknown before the unit is loaded,
/// so any directory with the unit's stem prefix qualifies.
fn dep_dirs(unit: &Path) -> Vec<PathBuf> {
    let (Some(parent), Some(stem)) = (unit.parent(), unit.file_stem().and_then(|s| s.to_str()))
    else {
        return Vec::new();
    };
    let deps_root = parent.join("Deps");
    let prefix = format!("{stem}-");
    let Ok(entries) = std::fs::read_dir(&deps_root) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&prefix))
        })
        .map(|e| e.path())
        .collect();
    dirs.sort();
    dirs
}

/// Normalize a unit path for identity comparisons (blacklist, registry)
#[must_use]
pub fn normalize_unit_path(path: &Path) -> String {
    match std::fs::canonicalize(path) {
        Ok(canonical) => canonical.to_string_lossy().into_owned(),
        Err(e) => {
            warn!("Cannot canonicalize '{}': {e}", path.display());
            path.to_string_lossy().into_owned()
        }
    }
}
