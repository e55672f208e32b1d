//! Command module - Strategy pattern for CLI commands.
//!
//! Each command is a separate module implementing the `CommandExecutor` trait.
//! The host and join commands, and the interactive menu, all end up in the
//! same conversation loop in [`chat`].

mod chat;
mod fingerprint;
mod host;
mod join;
mod prompt;

pub use host::HostCommand;
pub use join::JoinCommand;
pub use prompt::MenuCommand;

use anyhow::Result;

/// Trait for command execution - Strategy pattern.
///
/// Each command struct holds its parsed arguments and implements
/// this trait to define its execution logic.
pub trait CommandExecutor {
    /// Executes the command with its parsed arguments.
    fn execute(&self) -> Result<()>;
}
