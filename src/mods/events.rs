//! Fire-and-forget lifecycle events
//!
//! Observers (progress reporting, debug logging, mods themselves via the
//! event-init hook) subscribe callbacks; the host emits synchronously and
//! never consumes a return value. The only ordering guarantee is that an
//! event fires after the step that triggered it and before the next unit
//! is processed.

use std::sync::Mutex;

/// Notifications raised by the lifecycle manager and the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModEvent {
    /// A unit was successfully loaded and instantiated
    UnitParsed { unit: String },
    /// A unit completed finalization and its commands are registered
    UnitFinalized { unit: String },
    /// Finalization failed after a successful parse
    UnitFinalizationFailed { unit: String, reason: String },
    /// The unit could not be loaded at all
    UnitParseError { unit: String, reason: String },
    /// Raised before a mod command entry point is invoked
    PreExecuteCommand { line: String },
    /// Raised after the entry point returns, success or not
    PostExecuteCommand { line: String },
}

pub type EventListener = Box<dyn Fn(&ModEvent) + Send + Sync>;

/// Observer list for lifecycle events
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<Vec<EventListener>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: EventListener) {
        match self.listeners.lock() {
            Ok(mut listeners) => listeners.push(listener),
            Err(poisoned) => poisoned.into_inner().push(listener),
        }
    }

    /// Notify every listener in subscription order. Listener panics are
    /// not caught; listeners are host code, inside the trust boundary.
    pub fn emit(&self, event: &ModEvent) {
        let listeners = match self.listeners.lock() {
            Ok(listeners) => listeners,
            Err(poisoned) => poisoned.into_inner(),
        };
        for listener in listeners.iter() {
            listener(event);
        }
    }
}
