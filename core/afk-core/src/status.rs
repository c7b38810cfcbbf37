//! Presence state and the pending status applied on the next away-transition.

use crate::config::AgentConfig;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    #[default]
    Present,
    Away,
}

/// Status Store. `last_message_id` is only consulted while away.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Status {
    pub presence: Presence,
    pub last_message_id: Option<String>,
    /// Unix seconds of the last away-transition.
    pub last_activity_at: i64,
}

impl Status {
    pub fn is_away(&self) -> bool {
        self.presence == Presence::Away
    }
}

/// What the next away-transition will publish, and what the following
/// back-transition will say. `None` messages are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PendingStatus {
    pub status_text: String,
    pub status_emoji: String,
    pub away_message: Option<String>,
    pub back_message: Option<String>,
}

impl PendingStatus {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            status_text: config.status_text.clone(),
            status_emoji: config.status_emoji.clone(),
            away_message: config.default_away_message().map(str::to_string),
            back_message: config.default_back_message().map(str::to_string),
        }
    }
}

/// Read-only copy of the engine state for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub presence: Presence,
    pub last_message_id: Option<String>,
    pub last_activity_at: i64,
    pub pending: PendingStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_status_follows_config_defaults() {
        let config = AgentConfig {
            away_message: Some(String::new()),
            ..AgentConfig::default()
        };
        let pending = PendingStatus::from_config(&config);
        assert_eq!(pending.status_text, "I need a break");
        assert_eq!(pending.status_emoji, ":coffee:");
        assert!(pending.away_message.is_none());
        assert_eq!(pending.back_message.as_deref(), Some("I'm back"));
    }

    #[test]
    fn initial_status_is_present() {
        let status = Status::default();
        assert!(!status.is_away());
        assert!(status.last_message_id.is_none());
    }
}
