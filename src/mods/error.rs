//! Error taxonomy for mod loading and lifecycle operations

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while loading, finalizing, or stopping
/// a mod. Each failure is isolated to one unit: callers report it and
/// move on to the next unit.
#[derive(Debug, Error)]
pub enum ModError {
    /// The unit loaded but exposes no mod entry point; callers may try
    /// alternate interpretations before treating this as a failure
    #[error("unit does not expose a mod script entry point")]
    NotAMod,

    /// The unit (or one of its dependent libraries) could not be
    /// loaded; every individual reason is preserved for the operator
    #[error("failed to load unit: {}", .reasons.join("; "))]
    Load { reasons: Vec<String> },

    /// A mod with no part label cannot be shelved safely because part
    /// names key collision resolution
    #[error("mod in '{unit}' declares no part name")]
    MissingPartName { unit: String },

    /// A blank command key would poison the command registries
    #[error("mod in '{unit}' part '{part}' declares a blank command name")]
    MissingCommandName { unit: String, part: String },

    #[error("invalid manual page '{}': {reason}", .page.display())]
    InvalidManualPage { page: PathBuf, reason: String },

    /// Construction-time invariant: a mod descriptor must hold at least
    /// one part
    #[error("mod '{mod_name}' contains no parts")]
    NoPartsInMod { mod_name: String },

    /// Any other failure during finalization, wrapped with context
    #[error("finalization failed: {0}")]
    Finalization(#[from] anyhow::Error),
}

impl ModError {
    /// Single-reason load failure helper
    pub fn load(reason: impl Into<String>) -> Self {
        ModError::Load {
            reasons: vec![reason.into()],
        }
    }
}

pub type ModResult<T> = Result<T, ModError>;
