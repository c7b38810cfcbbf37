//! OS actions an action entry may trigger (sleep, lock screen).

use crate::error::{AfkError, Result};
use serde::Serialize;
use std::fmt;
use std::process::Command;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemCommand {
    Sleep,
    Lock,
    Unrecognized(String),
}

impl SystemCommand {
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "sleep" => SystemCommand::Sleep,
            "lock" => SystemCommand::Lock,
            other => SystemCommand::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SystemCommand::Sleep => "sleep",
            SystemCommand::Lock => "lock",
            SystemCommand::Unrecognized(name) => name,
        }
    }
}

impl fmt::Display for SystemCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait CommandExecutor: Send + Sync {
    /// Runs the command. Unrecognized commands are a logged no-op.
    fn execute(&self, command: &SystemCommand) -> Result<()>;
}

/// Runs commands through the platform's power-management tools.
#[derive(Debug, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, command: &SystemCommand) -> Result<()> {
        let argv = match command {
            SystemCommand::Unrecognized(name) => {
                tracing::warn!(command = %name, "Unknown command; ignoring");
                return Ok(());
            }
            known => platform_argv(known)?,
        };

        tracing::info!(command = %command, program = argv[0], "Executing command");
        let status = Command::new(argv[0])
            .args(&argv[1..])
            .status()
            .map_err(|err| AfkError::CommandFailed {
                command: command.to_string(),
                details: err.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(AfkError::CommandFailed {
                command: command.to_string(),
                details: format!("{} exited with {}", argv[0], status),
            })
        }
    }
}

#[cfg(target_os = "macos")]
fn platform_argv(command: &SystemCommand) -> Result<&'static [&'static str]> {
    match command {
        SystemCommand::Sleep => Ok(&["pmset", "sleepnow"]),
        SystemCommand::Lock => Ok(&["pmset", "displaysleepnow"]),
        SystemCommand::Unrecognized(name) => Err(AfkError::UnsupportedPlatform(name.clone())),
    }
}

#[cfg(target_os = "linux")]
fn platform_argv(command: &SystemCommand) -> Result<&'static [&'static str]> {
    match command {
        SystemCommand::Sleep => Ok(&["systemctl", "suspend"]),
        SystemCommand::Lock => Ok(&["loginctl", "lock-session"]),
        SystemCommand::Unrecognized(name) => Err(AfkError::UnsupportedPlatform(name.clone())),
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn platform_argv(command: &SystemCommand) -> Result<&'static [&'static str]> {
    Err(AfkError::UnsupportedPlatform(command.to_string()))
}
