//! Action resolution: merges a request's overrides with its configured action
//! entry and the global defaults.
//!
//! Precedence per field, highest first: non-empty request override, action
//! entry value, global default. Each field is resolved on its own.

use afk_agent_protocol::{ActionRequest, TERMINATE};

use crate::commands::SystemCommand;
use crate::config::{ActionEntry, AgentConfig, MessageSetting};
use crate::status::PendingStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub action: String,
    pub pending: PendingStatus,
    pub command: Option<SystemCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Action not found: {0}")]
    ActionNotFound(String),

    #[error("\"terminate\" is a control value, not an action")]
    ControlValue,
}

pub fn resolve(request: &ActionRequest, config: &AgentConfig) -> Result<Resolution, ResolveError> {
    let name = request.action.as_str();
    if name == TERMINATE {
        return Err(ResolveError::ControlValue);
    }
    let entry = config
        .find_action(name)
        .ok_or_else(|| ResolveError::ActionNotFound(name.to_string()))?;

    let away_message = if request.silent {
        None
    } else {
        resolve_message(
            request.away_message.as_deref(),
            &entry.away_message,
            config.default_away_message(),
        )
    };

    Ok(Resolution {
        action: entry.action.clone(),
        pending: PendingStatus {
            status_text: first_present([
                request.status_text.as_deref(),
                entry.status_text.as_deref(),
                Some(config.status_text.as_str()),
            ]),
            status_emoji: first_present([
                request.status_emoji.as_deref(),
                entry.status_emoji.as_deref(),
                Some(config.status_emoji.as_str()),
            ]),
            away_message,
            back_message: resolve_message(
                None,
                &entry.back_message,
                config.default_back_message(),
            ),
        },
        command: command_for(entry),
    })
}

fn command_for(entry: &ActionEntry) -> Option<SystemCommand> {
    entry
        .command
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(SystemCommand::parse)
}

/// First non-empty candidate, or empty when none is set.
fn first_present<const N: usize>(candidates: [Option<&str>; N]) -> String {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
        .unwrap_or_default()
        .to_string()
}

fn resolve_message(
    requested: Option<&str>,
    setting: &MessageSetting,
    default: Option<&str>,
) -> Option<String> {
    if let Some(text) = requested.filter(|text| !text.trim().is_empty()) {
        return Some(text.to_string());
    }
    match setting {
        MessageSetting::Text(text) => Some(text.clone()),
        MessageSetting::Disabled => None,
        MessageSetting::Inherit => default.map(str::to_string),
    }
}
