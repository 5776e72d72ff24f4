//! Kiln - A moddable terminal shell host
//!
//! This library provides the core functionality for the Kiln shell host:
//! discovery and lifecycle management of dynamically loaded command
//! mods, per-shell command registries, and command dispatch.
//!
//! # Modules
//!
//! - [`config`]: Configuration management and the key-value store
//! - [`mods`]: The mod host: capability contract, loader, lifecycle
//!   manager, registries, blacklist, and dispatcher

pub mod config;
pub mod mods;
