//! In-process mod host
//!
//! Discovers loadable units in the mods directory, verifies each
//! exposes the capability contract, registers contributed commands
//! into the per-shell command tables, and dispatches command lines
//! against them. Loaded mod code runs with host privileges; there is
//! no sandboxing here.

pub mod api;
pub mod blacklist;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod install;
pub mod lifecycle;
pub mod loader;
pub mod manual;
pub mod registry;

pub use api::{CommandAction, CommandSpec, ModScript, ShellKind};
pub use blacklist::Blacklist;
pub use dispatcher::{AllowAll, Authorizer, DispatchOutcome, Dispatcher};
pub use error::{ModError, ModResult};
pub use events::{EventBus, ModEvent};
pub use lifecycle::{LifecycleManager, NoScreensavers, ScreensaverCatalog};
pub use loader::{DylibLoader, LoadOutcome, ScriptInstance, UnitLoader};
pub use manual::{ManualIndexer, NullManualIndexer};
pub use registry::{CommandRegistries, ModDescriptor, PartDescriptor, PartRegistry};
