//! Capability contract for loadable mods
//!
//! A dynamic library is recognized as a mod when it exports the
//! [`MOD_ENTRY_SYMBOL`] factory function returning a [`ModScript`]
//! trait object. Everything else about the unit is opaque to the host.

use anyhow::Result;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::mods::events::EventBus;

/// Shell namespaces the host exposes. Each kind owns an independent
/// command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellKind {
    /// General interactive shell; the only kind with restricted commands
    Main,
    /// FTP sub-shell
    Ftp,
    /// Mail sub-shell
    Mail,
}

impl ShellKind {
    /// All shell kinds, in registry construction order
    pub const ALL: [ShellKind; 3] = [ShellKind::Main, ShellKind::Ftp, ShellKind::Mail];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ShellKind::Main => "main",
            ShellKind::Ftp => "ftp",
            ShellKind::Mail => "mail",
        }
    }
}

impl fmt::Display for ShellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry point invoked when a mod command is dispatched.
///
/// Receives the effective command name (after any collision rename) and
/// the parsed arguments; returns an exit code.
pub type CommandAction = Arc<dyn Fn(&str, &[String]) -> Result<i32> + Send + Sync>;

/// One command contributed by a mod part
#[derive(Clone)]
pub struct CommandSpec {
    /// Shell whose command table this command is registered into
    pub shell: ShellKind,
    /// Restricted commands require authorization on the main shell
    pub restricted: bool,
    /// Help text; synthesized during finalization when absent
    pub help: Option<String>,
    /// Execution entry point
    pub action: CommandAction,
}

impl CommandSpec {
    pub fn new(shell: ShellKind, action: CommandAction) -> Self {
        Self {
            shell,
            restricted: false,
            help: None,
            action,
        }
    }

    #[must_use]
    pub fn restricted(mut self) -> Self {
        self.restricted = true;
        self
    }

    #[must_use]
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("shell", &self.shell)
            .field("restricted", &self.restricted)
            .field("help", &self.help)
            .finish_non_exhaustive()
    }
}

/// The capability contract every loadable mod must implement
///
/// The lifecycle manager is the only component permitted to mutate the
/// command table (via [`ModScript::commands_mut`]), and only during
/// finalization; afterwards the table is read-only for dispatch.
pub trait ModScript: Send {
    /// Display name of the mod; may be blank, in which case the unit
    /// file name is used
    fn name(&self) -> &str;

    /// Part label; must be non-blank or finalization fails
    fn part(&self) -> &str;

    /// Declared version string
    fn version(&self) -> &str;

    /// Command table: command name to spec
    fn commands(&self) -> &HashMap<String, CommandSpec>;

    /// Mutable command table, used by finalization to rename colliding
    /// keys in place and by stop to drain the table
    fn commands_mut(&mut self) -> &mut HashMap<String, CommandSpec>;

    /// Start hook, invoked once after the unit is instantiated
    ///
    /// # Errors
    /// A failed start aborts finalization for this unit only.
    fn on_start(&mut self) -> Result<()>;

    /// Stop hook, invoked when the part is removed
    fn on_stop(&mut self);

    /// Event-init hook: lets a mod subscribe to host lifecycle events
    fn init_events(&mut self, _events: &EventBus) {}
}

/// Function signature a unit must export under [`MOD_ENTRY_SYMBOL`]
pub type ModScriptCreate = unsafe fn() -> *mut dyn ModScript;

/// Exported factory symbol probed by the loader
pub const MOD_ENTRY_SYMBOL: &[u8] = b"_mod_script_create";
