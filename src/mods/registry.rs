//! Part registry and per-shell command registries
//!
//! The part registry tracks which mods are live and which parts each one
//! holds. The command registries are the per-shell command tables the
//! dispatcher reads; the lifecycle manager is their sole writer. Both are
//! plain values constructed by the host (no globals) so tests can build
//! isolated instances per case.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::RwLock;

use crate::mods::api::{CommandSpec, ShellKind};
use crate::mods::error::{ModError, ModResult};
use crate::mods::loader::ScriptInstance;

/// One contributed unit's registration under a mod
pub struct PartDescriptor {
    /// Owning mod name
    pub mod_name: String,
    /// Part name; unique within the mod after collision renaming
    pub part_name: String,
    /// Originating unit file name
    pub file_name: String,
    /// Normalized unit path
    pub path: PathBuf,
    /// The live capability-contract object, owned exclusively here
    pub script: ScriptInstance,
}

/// Identity of one logical mod and its parts, in registration order
pub struct ModDescriptor {
    pub name: String,
    pub file_name: String,
    pub path: PathBuf,
    pub version: String,
    parts: Vec<PartDescriptor>,
}

impl ModDescriptor {
    /// Build a descriptor from its initial parts.
    ///
    /// # Errors
    /// Returns [`ModError::NoPartsInMod`] when `parts` is empty.
    pub fn new(
        name: impl Into<String>,
        file_name: impl Into<String>,
        path: PathBuf,
        version: impl Into<String>,
        parts: Vec<PartDescriptor>,
    ) -> ModResult<Self> {
        let name = name.into();
        if parts.is_empty() {
            return Err(ModError::NoPartsInMod { mod_name: name });
        }
        Ok(Self {
            name,
            file_name: file_name.into(),
            path,
            version: version.into(),
            parts,
        })
    }

    #[must_use]
    pub fn parts(&self) -> &[PartDescriptor] {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut Vec<PartDescriptor> {
        &mut self.parts
    }

    #[must_use]
    pub fn has_part(&self, part_name: &str) -> bool {
        self.parts.iter().any(|p| p.part_name == part_name)
    }
}

/// In-memory store mapping mod names to their parts, in registration order
#[derive(Default)]
pub struct PartRegistry {
    mods: Vec<ModDescriptor>,
}

impl PartRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, mod_name: &str) -> Option<&ModDescriptor> {
        self.mods.iter().find(|m| m.name == mod_name)
    }

    pub fn get_mut(&mut self, mod_name: &str) -> Option<&mut ModDescriptor> {
        self.mods.iter_mut().find(|m| m.name == mod_name)
    }

    /// Register a part, creating the mod descriptor when this is the
    /// first part under that name.
    pub fn insert(
        &mut self,
        mod_name: &str,
        version: &str,
        part: PartDescriptor,
    ) -> ModResult<()> {
        if let Some(descriptor) = self.get_mut(mod_name) {
            descriptor.parts.push(part);
            return Ok(());
        }
        let descriptor = ModDescriptor::new(
            mod_name,
            part.file_name.clone(),
            part.path.clone(),
            version,
            vec![part],
        )?;
        self.mods.push(descriptor);
        Ok(())
    }

    /// Remove a whole mod, returning its descriptor for teardown
    pub fn remove(&mut self, mod_name: &str) -> Option<ModDescriptor> {
        let idx = self.mods.iter().position(|m| m.name == mod_name)?;
        Some(self.mods.remove(idx))
    }

    /// Mods in registration order
    #[must_use]
    pub fn mods(&self) -> &[ModDescriptor] {
        &self.mods
    }

    /// Mod names whose unit file name matches, in registration order
    #[must_use]
    pub fn mod_names_for_file(&self, file_name: &str) -> Vec<String> {
        self.mods
            .iter()
            .filter(|m| {
                m.file_name == file_name
                    || m.parts.iter().any(|p| p.file_name == file_name)
            })
            .map(|m| m.name.clone())
            .collect()
    }

    /// All mod names, in registration order
    #[must_use]
    pub fn mod_names(&self) -> Vec<String> {
        self.mods.iter().map(|m| m.name.clone()).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }
}

/// A command entry in a shell's registry, tagged with its contributor
#[derive(Clone)]
pub struct RegisteredCommand {
    pub mod_name: String,
    pub part_name: String,
    pub spec: CommandSpec,
}

struct ShellCommands {
    /// Host built-in command names; never touched by mod registration
    builtins: HashSet<String>,
    /// Mod-contributed commands keyed by effective (possibly renamed) name
    mods: HashMap<String, RegisteredCommand>,
}

/// One lock-guarded command table per shell kind
///
/// Reads happen on whatever thread services shell input; writes only
/// during lifecycle operations. The per-shell `RwLock` keeps a reload
/// from exposing a half-updated table to a dispatch in flight.
pub struct CommandRegistries {
    shells: HashMap<ShellKind, RwLock<ShellCommands>>,
}

impl CommandRegistries {
    /// Build registries with the host's built-in command names per shell
    #[must_use]
    pub fn new(builtins: HashMap<ShellKind, Vec<String>>) -> Self {
        let mut shells = HashMap::new();
        for kind in ShellKind::ALL {
            let names = builtins.get(&kind).cloned().unwrap_or_default();
            shells.insert(
                kind,
                RwLock::new(ShellCommands {
                    builtins: names.into_iter().collect(),
                    mods: HashMap::new(),
                }),
            );
        }
        Self { shells }
    }

    /// Registries with empty built-in sets
    #[must_use]
    pub fn empty() -> Self {
        Self::new(HashMap::new())
    }

    fn shell(&self, kind: ShellKind) -> &RwLock<ShellCommands> {
        // Every kind is inserted at construction
        &self.shells[&kind]
    }

    /// True when `name` is taken in `kind`'s table, built-in or mod
    #[must_use]
    pub fn contains(&self, kind: ShellKind, name: &str) -> bool {
        let shell = match self.shell(kind).read() {
            Ok(shell) => shell,
            Err(poisoned) => poisoned.into_inner(),
        };
        shell.builtins.contains(name) || shell.mods.contains_key(name)
    }

    #[must_use]
    pub fn is_builtin(&self, kind: ShellKind, name: &str) -> bool {
        let shell = match self.shell(kind).read() {
            Ok(shell) => shell,
            Err(poisoned) => poisoned.into_inner(),
        };
        shell.builtins.contains(name)
    }

    pub fn insert(&self, kind: ShellKind, name: impl Into<String>, command: RegisteredCommand) {
        let mut shell = match self.shell(kind).write() {
            Ok(shell) => shell,
            Err(poisoned) => poisoned.into_inner(),
        };
        shell.mods.insert(name.into(), command);
    }

    pub fn remove(&self, kind: ShellKind, name: &str) -> Option<RegisteredCommand> {
        let mut shell = match self.shell(kind).write() {
            Ok(shell) => shell,
            Err(poisoned) => poisoned.into_inner(),
        };
        shell.mods.remove(name)
    }

    /// Look up a mod command by effective name
    #[must_use]
    pub fn get(&self, kind: ShellKind, name: &str) -> Option<RegisteredCommand> {
        let shell = match self.shell(kind).read() {
            Ok(shell) => shell,
            Err(poisoned) => poisoned.into_inner(),
        };
        shell.mods.get(name).cloned()
    }

    /// Drop every mod command from every shell; built-ins survive
    pub fn clear_mod_commands(&self) {
        for kind in ShellKind::ALL {
            let mut shell = match self.shell(kind).write() {
                Ok(shell) => shell,
                Err(poisoned) => poisoned.into_inner(),
            };
            shell.mods.clear();
        }
    }

    /// Mod command names registered in one shell, unordered
    #[must_use]
    pub fn mod_command_names(&self, kind: ShellKind) -> Vec<String> {
        let shell = match self.shell(kind).read() {
            Ok(shell) => shell,
            Err(poisoned) => poisoned.into_inner(),
        };
        shell.mods.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mods::api::CommandAction;
    use std::sync::Arc;

    fn noop_action() -> CommandAction {
        Arc::new(|_, _| Ok(0))
    }

    fn command(mod_name: &str) -> RegisteredCommand {
        RegisteredCommand {
            mod_name: mod_name.to_string(),
            part_name: "Core".to_string(),
            spec: CommandSpec::new(ShellKind::Main, noop_action()),
        }
    }

    #[test]
    fn test_builtins_are_seeded_per_shell() {
        let mut builtins = HashMap::new();
        builtins.insert(ShellKind::Main, vec!["help".to_string()]);
        let registries = CommandRegistries::new(builtins);

        assert!(registries.contains(ShellKind::Main, "help"));
        assert!(registries.is_builtin(ShellKind::Main, "help"));
        assert!(!registries.contains(ShellKind::Ftp, "help"));
    }

    #[test]
    fn test_clear_mod_commands_keeps_builtins() {
        let mut builtins = HashMap::new();
        builtins.insert(ShellKind::Main, vec!["help".to_string()]);
        let registries = CommandRegistries::new(builtins);

        registries.insert(ShellKind::Main, "scan", command("DemoMod"));
        registries.insert(ShellKind::Ftp, "put", command("DemoMod"));
        registries.clear_mod_commands();

        assert!(registries.mod_command_names(ShellKind::Main).is_empty());
        assert!(registries.mod_command_names(ShellKind::Ftp).is_empty());
        assert!(registries.is_builtin(ShellKind::Main, "help"));
    }

    #[test]
    fn test_remove_returns_entry() {
        let registries = CommandRegistries::empty();
        registries.insert(ShellKind::Mail, "send", command("MailMod"));

        let removed = registries.remove(ShellKind::Mail, "send");
        assert!(removed.is_some());
        assert_eq!(removed.unwrap().mod_name, "MailMod");
        assert!(!registries.contains(ShellKind::Mail, "send"));
    }

    #[test]
    fn test_mod_descriptor_requires_parts() {
        let result = ModDescriptor::new(
            "Empty",
            "empty.so",
            PathBuf::from("/mods/empty.so"),
            "1.0",
            Vec::new(),
        );
        assert!(matches!(result, Err(ModError::NoPartsInMod { .. })));
    }
}
