//! Command dispatch for mod-contributed commands
//!
//! Given a raw command line and a shell kind, decides whether the line
//! maps to a mod command, checks authorization for restricted commands
//! on the main shell, and invokes the entry point with parsed
//! arguments. Never propagates an error outward: failures are reported
//! and folded into a non-zero outcome.

use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::mods::api::ShellKind;
use crate::mods::events::{EventBus, ModEvent};
use crate::mods::registry::{CommandRegistries, PartRegistry};

/// Permission collaborator consulted before a restricted command runs
pub trait Authorizer: Send + Sync {
    fn allow_restricted(&self, command: &str) -> bool;
}

/// Grants everything; default wiring for a trusted local session
#[derive(Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn allow_restricted(&self, _command: &str) -> bool {
        true
    }
}

/// Result of one dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The line does not map to a mod command; the shell's own
    /// execution engine should handle it
    NotFound,
    /// A restricted command was refused by the authorizer
    Denied,
    /// The entry point ran; carries its exit code
    Completed(i32),
}

impl DispatchOutcome {
    /// Conventional exit indication for the shell
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            DispatchOutcome::NotFound => 127,
            DispatchOutcome::Denied => 1,
            DispatchOutcome::Completed(code) => code,
        }
    }
}

pub struct Dispatcher {
    commands: Arc<CommandRegistries>,
    parts: Arc<RwLock<PartRegistry>>,
    authorizer: Arc<dyn Authorizer>,
    events: Arc<EventBus>,
}

impl Dispatcher {
    pub fn new(
        commands: Arc<CommandRegistries>,
        parts: Arc<RwLock<PartRegistry>>,
        authorizer: Arc<dyn Authorizer>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            commands,
            parts,
            authorizer,
            events,
        }
    }

    /// Dispatch one raw command line against `shell`'s command table
    pub fn execute(&self, line: &str, shell: ShellKind) -> DispatchOutcome {
        let tokens = split_command_line(line);
        let Some(token) = tokens.first() else {
            return DispatchOutcome::NotFound;
        };
        let args = &tokens[1..];

        let effective = self.normalize(token, shell);
        let Some(command) = self.commands.get(shell, &effective) else {
            return DispatchOutcome::NotFound;
        };

        // Restricted commands are only a main-shell concept; every
        // other shell kind executes unconditionally
        if shell == ShellKind::Main
            && command.spec.restricted
            && !self.authorizer.allow_restricted(&effective)
        {
            warn!("Permission denied for restricted command '{effective}'");
            return DispatchOutcome::Denied;
        }

        self.events.emit(&ModEvent::PreExecuteCommand {
            line: line.to_string(),
        });
        let result = (command.spec.action)(&effective, args);
        self.events.emit(&ModEvent::PostExecuteCommand {
            line: line.to_string(),
        });

        match result {
            Ok(code) => DispatchOutcome::Completed(code),
            Err(e) => {
                warn!(
                    "Command '{effective}' from mod '{}' failed: {e}",
                    command.mod_name
                );
                DispatchOutcome::Completed(1)
            }
        }
    }

    /// Resolve an alias back to its mod's primary name: when a mod's
    /// own command table contains the token and the mod declares a
    /// distinct primary name that is itself registered in this shell,
    /// the primary name becomes the effective command.
    fn normalize(&self, token: &str, shell: ShellKind) -> String {
        let parts = match self.parts.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for descriptor in parts.mods() {
            let holds_token = descriptor
                .parts()
                .iter()
                .any(|p| p.script.script().commands().contains_key(token));
            if !holds_token {
                continue;
            }
            if descriptor.name != token && self.commands.contains(shell, &descriptor.name) {
                debug!("Alias '{token}' resolved to '{}'", descriptor.name);
                return descriptor.name.clone();
            }
            break;
        }
        token.to_string()
    }
}

/// Split a raw command line into tokens, honoring double-quoted tokens
/// as atomic
#[must_use]
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_tokens() {
        assert_eq!(
            split_command_line("scan 10.0.0.1 80"),
            vec!["scan", "10.0.0.1", "80"]
        );
    }

    #[test]
    fn test_split_quoted_token_is_atomic() {
        assert_eq!(
            split_command_line(r#"open "my file.txt" now"#),
            vec!["open", "my file.txt", "now"]
        );
    }

    #[test]
    fn test_split_unterminated_quote_keeps_rest() {
        assert_eq!(
            split_command_line(r#"echo "hello world"#),
            vec!["echo", "hello world"]
        );
    }

    #[test]
    fn test_split_empty_line() {
        assert!(split_command_line("   ").is_empty());
    }

    #[test]
    fn test_outcome_codes() {
        assert_eq!(DispatchOutcome::NotFound.code(), 127);
        assert_eq!(DispatchOutcome::Denied.code(), 1);
        assert_eq!(DispatchOutcome::Completed(0).code(), 0);
        assert_eq!(DispatchOutcome::Completed(3).code(), 3);
    }
}
