//! Mod lifecycle orchestration
//!
//! Start/stop/reload for one unit or all units: invokes the contract's
//! hooks, validates required fields, resolves part and command name
//! collisions, updates the part registry and the per-shell command
//! registries, and raises lifecycle events. All operations run on a
//! single controlling thread; the command registries' locks keep
//! concurrent dispatch reads consistent while this writer runs.

use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::mods::api::ShellKind;
use crate::mods::blacklist::Blacklist;
use crate::mods::error::{ModError, ModResult};
use crate::mods::events::{EventBus, ModEvent};
use crate::mods::loader::{normalize_unit_path, LoadOutcome, ScriptInstance, UnitLoader};
use crate::mods::manual::{collect_man_pages, manual_dir_for, ManualIndexer, NullManualIndexer};
use crate::mods::registry::{CommandRegistries, PartDescriptor, PartRegistry, RegisteredCommand};

/// Collaborator that interprets units which are not mods as screensaver
/// definitions. The lifecycle manager escalates a `NotAMod` load outcome
/// here before treating it as a genuine failure.
pub trait ScreensaverCatalog: Send + Sync {
    /// Try to parse `unit` as a screensaver definition.
    ///
    /// Returns `Ok(true)` when the unit was accepted and recorded.
    ///
    /// # Errors
    /// Returns an error when the unit looked like a screensaver but was
    /// malformed.
    fn try_parse(&self, unit: &Path) -> Result<bool>;

    /// Drop every custom screensaver; part of the StopAll sweep
    fn clear(&self);
}

/// Catalog that declines everything
#[derive(Default)]
pub struct NoScreensavers;

impl ScreensaverCatalog for NoScreensavers {
    fn try_parse(&self, _unit: &Path) -> Result<bool> {
        Ok(false)
    }

    fn clear(&self) {}
}

/// Orchestrates mod start/stop/reload against the injected registries
pub struct LifecycleManager {
    mods_dir: PathBuf,
    safe_mode: bool,
    loader: Box<dyn UnitLoader>,
    parts: Arc<RwLock<PartRegistry>>,
    commands: Arc<CommandRegistries>,
    blacklist: Blacklist,
    manuals: Arc<dyn ManualIndexer>,
    screensavers: Arc<dyn ScreensaverCatalog>,
    events: Arc<EventBus>,
}

impl LifecycleManager {
    pub fn new(
        mods_dir: impl Into<PathBuf>,
        safe_mode: bool,
        loader: Box<dyn UnitLoader>,
        commands: Arc<CommandRegistries>,
        blacklist: Blacklist,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            mods_dir: mods_dir.into(),
            safe_mode,
            loader,
            parts: Arc::new(RwLock::new(PartRegistry::new())),
            commands,
            blacklist,
            manuals: Arc::new(NullManualIndexer),
            screensavers: Arc::new(NoScreensavers),
            events,
        }
    }

    #[must_use]
    pub fn with_manuals(mut self, manuals: Arc<dyn ManualIndexer>) -> Self {
        self.manuals = manuals;
        self
    }

    #[must_use]
    pub fn with_screensavers(mut self, screensavers: Arc<dyn ScreensaverCatalog>) -> Self {
        self.screensavers = screensavers;
        self
    }

    /// Shared handle to the part registry; the dispatcher reads it for
    /// alias normalization
    #[must_use]
    pub fn parts(&self) -> Arc<RwLock<PartRegistry>> {
        self.parts.clone()
    }

    #[must_use]
    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    #[must_use]
    pub fn mods_dir(&self) -> &Path {
        &self.mods_dir
    }

    #[must_use]
    pub fn manual_indexer(&self) -> &dyn ManualIndexer {
        self.manuals.as_ref()
    }

    fn parts_read(&self) -> RwLockReadGuard<'_, PartRegistry> {
        match self.parts.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn parts_write(&self) -> RwLockWriteGuard<'_, PartRegistry> {
        match self.parts.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Load and finalize every non-blacklisted unit in the mods
    /// directory. One unit's failure is reported and the loop continues;
    /// this never aborts the whole pass.
    ///
    /// # Errors
    /// Returns an error only when the mods directory itself cannot be
    /// created or enumerated.
    pub fn start_all(&self) -> Result<()> {
        if self.safe_mode {
            info!("Safe mode active; mod loading is disabled");
            return Ok(());
        }

        std::fs::create_dir_all(&self.mods_dir).with_context(|| {
            format!("Failed to create mods directory '{}'", self.mods_dir.display())
        })?;

        for unit in self.candidate_units()? {
            if self.blacklist.contains(&unit) {
                info!("Skipping blacklisted unit: {}", unit.display());
                continue;
            }
            if let Err(e) = self.start_unit(&unit) {
                warn!("Unit '{}' failed to start: {e}", unit.display());
            }
        }
        Ok(())
    }

    /// Start a single unit by file name inside the mods directory.
    ///
    /// # Errors
    /// Returns the unit's load or finalization error.
    pub fn start(&self, unit_file: &str) -> ModResult<()> {
        if self.safe_mode {
            info!("Safe mode active; mod loading is disabled");
            return Ok(());
        }
        let unit = self.mods_dir.join(unit_file);
        self.start_unit(&unit)
    }

    /// Stop every part contributed by `unit_file`, newest mod first. A
    /// mod descriptor is removed once its last part is stopped.
    pub fn stop(&self, unit_file: &str) {
        if self.safe_mode {
            info!("Safe mode active; mod unloading is disabled");
            return;
        }
        let names = self.parts_read().mod_names_for_file(unit_file);
        for name in names.iter().rev() {
            self.stop_parts(name, Some(unit_file));
        }
    }

    /// Stop every mod, newest first, then sweep every shell's mod
    /// command table and the screensaver catalog so no orphaned entries
    /// survive.
    pub fn stop_all(&self) {
        if self.safe_mode {
            info!("Safe mode active; mod unloading is disabled");
            return;
        }
        let names = self.parts_read().mod_names();
        for name in names.iter().rev() {
            self.stop_mod(name);
        }
        self.commands.clear_mod_commands();
        self.screensavers.clear();
    }

    /// Stop then start, sequentially. A failed stop never prevents the
    /// start attempt.
    ///
    /// # Errors
    /// Returns the start attempt's error.
    pub fn reload(&self, unit_file: &str) -> ModResult<()> {
        self.stop(unit_file);
        self.start(unit_file)
    }

    fn candidate_units(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.mods_dir).with_context(|| {
            format!("Failed to read mods directory '{}'", self.mods_dir.display())
        })?;
        let mut units: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        // Sorted so the load-order-dependent collision renames are at
        // least deterministic for a given directory state
        units.sort();
        Ok(units)
    }

    fn start_unit(&self, unit: &Path) -> ModResult<()> {
        let unit_name = unit
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| unit.to_string_lossy().into_owned());

        let outcome = match self.loader.load(unit) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.events.emit(&ModEvent::UnitParseError {
                    unit: unit_name,
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };

        let instance = match outcome {
            LoadOutcome::Ignored => return Ok(()),
            LoadOutcome::Script(instance) => instance,
            LoadOutcome::NotAMod => {
                // Alternate interpretation before concluding failure
                match self.screensavers.try_parse(unit) {
                    Ok(true) => {
                        debug!("Unit '{}' registered as screensaver", unit.display());
                        return Ok(());
                    }
                    Ok(false) => {
                        let err = ModError::NotAMod;
                        self.events.emit(&ModEvent::UnitParseError {
                            unit: unit_name,
                            reason: err.to_string(),
                        });
                        return Err(err);
                    }
                    Err(e) => {
                        self.events.emit(&ModEvent::UnitParseError {
                            unit: unit_name,
                            reason: e.to_string(),
                        });
                        return Err(ModError::Finalization(e));
                    }
                }
            }
        };

        self.events.emit(&ModEvent::UnitParsed {
            unit: unit_name.clone(),
        });

        match self.finalize(unit, &unit_name, instance) {
            Ok(mod_name) => {
                info!("Finalized mod '{mod_name}' from '{unit_name}'");
                self.events.emit(&ModEvent::UnitFinalized { unit: unit_name });
                Ok(())
            }
            Err(e) => {
                warn!("Finalization of '{unit_name}' failed: {e}");
                self.events.emit(&ModEvent::UnitFinalizationFailed {
                    unit: unit_name,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// The finalization pipeline. Shared state is mutated only after
    /// every validation has passed, so a failure leaves no partial
    /// registration visible.
    fn finalize(
        &self,
        unit: &Path,
        unit_name: &str,
        mut instance: ScriptInstance,
    ) -> ModResult<String> {
        instance.script_mut().on_start()?;
        instance.script_mut().init_events(&self.events);

        let part_label = instance.script().part().trim().to_string();
        if part_label.is_empty() {
            return Err(ModError::MissingPartName {
                unit: unit_name.to_string(),
            });
        }

        if instance
            .script()
            .commands()
            .keys()
            .any(|k| k.trim().is_empty())
        {
            return Err(ModError::MissingCommandName {
                unit: unit_name.to_string(),
                part: part_label,
            });
        }

        let declared = instance.script().name().trim().to_string();
        let mod_name = if declared.is_empty() {
            unit_name.to_string()
        } else {
            declared
        };
        let version = instance.script().version().to_string();

        // Part names key collision resolution within a mod, so a
        // colliding label is suffixed with the current part count
        let part_name = {
            let parts = self.parts_read();
            match parts.get(&mod_name) {
                Some(descriptor) if descriptor.has_part(&part_label) => {
                    renamed_part(&part_label, descriptor.parts().len())
                }
                _ => part_label,
            }
        };

        // Plan command renames without touching the registries yet. The
        // newly arriving command is always the one renamed, never the
        // incumbent, whether the incumbent is a built-in or another mod.
        let mut keys: Vec<String> = instance.script().commands().keys().cloned().collect();
        keys.sort();
        let mut pending: HashSet<(ShellKind, String)> = HashSet::new();
        let mut plan: Vec<(String, String, ShellKind)> = Vec::new();
        for key in keys {
            let shell = instance.script().commands()[&key].shell;
            let taken = self.commands.contains(shell, &key)
                || pending.contains(&(shell, key.clone()));
            let effective = if taken {
                let renamed = renamed_command(&key, &mod_name, &part_name);
                debug!("Command '{key}' collides in {shell} shell; renamed to '{renamed}'");
                renamed
            } else {
                key.clone()
            };
            pending.insert((shell, effective.clone()));
            plan.push((key, effective, shell));
        }

        self.index_manuals(unit)?;

        // Commit. Rewrite the script's own table in place so internal
        // lookups by the mod stay self-consistent with the registries.
        let mut registrations: Vec<(ShellKind, String, RegisteredCommand)> = Vec::new();
        let mut table = std::mem::take(instance.script_mut().commands_mut());
        for (original, effective, shell) in plan {
            let Some(mut spec) = table.remove(&original) else {
                continue;
            };
            if spec.help.is_none() {
                spec.help = Some(format!(
                    "Provided by mod '{mod_name}', part '{part_name}'."
                ));
            }
            registrations.push((
                shell,
                effective.clone(),
                RegisteredCommand {
                    mod_name: mod_name.clone(),
                    part_name: part_name.clone(),
                    spec: spec.clone(),
                },
            ));
            instance.script_mut().commands_mut().insert(effective, spec);
        }

        let part = PartDescriptor {
            mod_name: mod_name.clone(),
            part_name,
            file_name: unit_name.to_string(),
            path: PathBuf::from(normalize_unit_path(unit)),
            script: instance,
        };
        self.parts_write().insert(&mod_name, &version, part)?;

        for (shell, name, command) in registrations {
            self.commands.insert(shell, name, command);
        }

        Ok(mod_name)
    }

    fn index_manuals(&self, unit: &Path) -> ModResult<()> {
        let Some(dir) = manual_dir_for(unit) else {
            return Ok(());
        };
        if !dir.is_dir() {
            return Ok(());
        }
        let pages = collect_man_pages(&dir).map_err(|e| {
            ModError::Finalization(anyhow!(
                "cannot enumerate manual directory '{}': {e}",
                dir.display()
            ))
        })?;
        for page in pages {
            if let Err(e) = self.manuals.index_page(&page) {
                return Err(ModError::InvalidManualPage {
                    page,
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }

    fn stop_mod(&self, mod_name: &str) {
        self.stop_parts(mod_name, None);
    }

    /// Remove parts of `mod_name` (all of them, or only those from one
    /// unit file), tearing each down outside the registry lock. The mod
    /// descriptor goes away with its last part.
    fn stop_parts(&self, mod_name: &str, file_filter: Option<&str>) {
        let removed: Vec<PartDescriptor> = {
            let mut parts = self.parts_write();
            let Some(descriptor) = parts.get_mut(mod_name) else {
                return;
            };
            let removed = match file_filter {
                None => descriptor.parts_mut().drain(..).collect(),
                Some(file) => {
                    let mut kept = Vec::new();
                    let mut removed = Vec::new();
                    for part in descriptor.parts_mut().drain(..) {
                        if part.file_name == file {
                            removed.push(part);
                        } else {
                            kept.push(part);
                        }
                    }
                    *descriptor.parts_mut() = kept;
                    removed
                }
            };
            if descriptor.parts().is_empty() {
                parts.remove(mod_name);
            }
            removed
        };

        for mut part in removed {
            // Registered names were rewritten into the script's own
            // table at finalization; remove by those exact keys
            let keys: Vec<(ShellKind, String)> = part
                .script
                .script()
                .commands()
                .iter()
                .map(|(key, spec)| (spec.shell, key.clone()))
                .collect();
            for (shell, key) in keys {
                if self.commands.remove(shell, &key).is_none() {
                    warn!("Command '{key}' was missing from the {shell} shell registry");
                }
            }
            part.script.script_mut().on_stop();
            part.script.script_mut().commands_mut().clear();
            info!("Stopped mod '{mod_name}' part '{}'", part.part_name);
        }
    }
}

fn renamed_part(label: &str, current_count: usize) -> String {
    format!("{label} [{current_count}]")
}

fn renamed_command(key: &str, mod_name: &str, part_name: &str) -> String {
    format!("{key}-{mod_name}-{part_name}")
}
