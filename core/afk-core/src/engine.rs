//! Transition engine: the PRESENT/AWAY state machine.
//!
//! The engine is the only writer of the Status Store and the Pending Status
//! Config. Both live behind one mutex. Slack calls are made with the mutex
//! released; a transition claims the state first (flip + epoch bump) and
//! commits results afterwards only if no newer transition has happened.

use afk_agent_protocol::ActionRequest;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::bridge::{ScreenEvent, ScreenEventSink};
use crate::commands::{CommandExecutor, SystemCommand, SystemCommandExecutor};
use crate::config::{AgentConfig, ConfigStore};
use crate::liveness::{ClientLiveness, ProcessLiveness};
use crate::resolver::{resolve, ResolveError};
use crate::slack::{SlackApi, SlackError};
use crate::status::{PendingStatus, Presence, Status, StatusSnapshot};

/// Source of unix time in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyAway,
    AlreadyPresent,
    ClientUnreachable,
}

/// How the return was announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackNotice {
    Reaction,
    Message,
    Nothing,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    Away { message_id: Option<String> },
    Back { notice: BackNotice },
    Skipped { reason: SkipReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub action: String,
    pub pending: PendingStatus,
    pub command: Option<SystemCommand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_error: Option<String>,
}

#[derive(Debug)]
struct EngineState {
    status: Status,
    pending: PendingStatus,
    /// Bumped on every transition; in-flight results for an older epoch are dropped.
    epoch: u64,
}

pub struct TransitionEngine {
    config: Arc<ConfigStore>,
    slack: Arc<dyn SlackApi>,
    liveness: Arc<dyn ClientLiveness>,
    executor: Arc<dyn CommandExecutor>,
    clock: Arc<dyn Clock>,
    state: Mutex<EngineState>,
}

impl TransitionEngine {
    pub fn new(config: Arc<ConfigStore>, slack: Arc<dyn SlackApi>) -> Self {
        let pending = PendingStatus::from_config(&config.snapshot());
        Self {
            config,
            slack,
            liveness: Arc::new(ProcessLiveness),
            executor: Arc::new(SystemCommandExecutor),
            clock: Arc::new(SystemClock),
            state: Mutex::new(EngineState {
                status: Status::default(),
                pending,
                epoch: 0,
            }),
        }
    }

    pub fn with_liveness(mut self, liveness: Arc<dyn ClientLiveness>) -> Self {
        self.liveness = liveness;
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let state = self.lock_state();
        StatusSnapshot {
            presence: state.status.presence,
            last_message_id: state.status.last_message_id.clone(),
            last_activity_at: state.status.last_activity_at,
            pending: state.pending.clone(),
        }
    }

    pub fn handle(&self, event: ScreenEvent) -> TransitionOutcome {
        match event {
            ScreenEvent::Locked => self.screen_locked(),
            ScreenEvent::Unlocked => self.screen_unlocked(),
        }
    }

    pub fn screen_locked(&self) -> TransitionOutcome {
        tracing::info!("Screen has been locked");
        if self.lock_state().status.is_away() {
            return skipped(SkipReason::AlreadyAway);
        }

        let config = self.config.snapshot();
        if !self.liveness.is_reachable(config.client_app()) {
            tracing::info!(
                client_app = ?config.client_app(),
                "Messaging client not running; skipping away transition"
            );
            return skipped(SkipReason::ClientUnreachable);
        }

        let (epoch, pending) = {
            let mut state = self.lock_state();
            if state.status.is_away() {
                return skipped(SkipReason::AlreadyAway);
            }
            state.epoch += 1;
            state.status.presence = Presence::Away;
            state.status.last_message_id = None;
            state.status.last_activity_at = self.clock.now();
            (state.epoch, state.pending.clone())
        };

        let message_id = match self.publish_away(&config, &pending) {
            Ok(message_id) => message_id,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to publish away status");
                None
            }
        };

        if let Some(id) = message_id.as_ref() {
            let mut state = self.lock_state();
            if state.epoch == epoch && state.status.is_away() {
                state.status.last_message_id = Some(id.clone());
                // The reaction window runs from when the away message landed.
                state.status.last_activity_at = self.clock.now();
            } else {
                tracing::debug!(message_id = %id, "Away message id superseded by a newer transition");
            }
        }

        TransitionOutcome::Away { message_id }
    }

    pub fn screen_unlocked(&self) -> TransitionOutcome {
        tracing::info!("Screen has been unlocked");
        if !self.lock_state().status.is_away() {
            return skipped(SkipReason::AlreadyPresent);
        }

        let config = self.config.snapshot();
        if !self.liveness.is_reachable(config.client_app()) {
            tracing::info!(
                client_app = ?config.client_app(),
                "Messaging client not running; skipping back transition"
            );
            return skipped(SkipReason::ClientUnreachable);
        }

        // Pending resets together with the flip; an action stored while the
        // calls below are in flight is kept for the next away-transition.
        let (pending, last_message_id, last_activity_at) = {
            let mut state = self.lock_state();
            if !state.status.is_away() {
                return skipped(SkipReason::AlreadyPresent);
            }
            state.epoch += 1;
            state.status.presence = Presence::Present;
            let pending =
                std::mem::replace(&mut state.pending, PendingStatus::from_config(&config));
            (
                pending,
                state.status.last_message_id.clone(),
                state.status.last_activity_at,
            )
        };
        tracing::debug!("Pending status reset to defaults");

        let notice = match self.publish_back(
            &config,
            &pending,
            last_message_id.as_deref(),
            last_activity_at,
        ) {
            Ok(notice) => notice,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to publish back status");
                BackNotice::Failed
            }
        };

        TransitionOutcome::Back { notice }
    }

    /// Resolves a named action, stores the merged status as pending and runs
    /// the action's command, if any. State is untouched when resolution fails.
    pub fn apply_action(&self, request: &ActionRequest) -> Result<ActionOutcome, ResolveError> {
        let config = self.config.snapshot();
        let resolution = resolve(request, &config)?;

        self.lock_state().pending = resolution.pending.clone();
        tracing::info!(
            action = %resolution.action,
            status_text = %resolution.pending.status_text,
            status_emoji = %resolution.pending.status_emoji,
            away_message = ?resolution.pending.away_message,
            back_message = ?resolution.pending.back_message,
            command = ?resolution.command.as_ref().map(SystemCommand::as_str),
            "Executing user defined action"
        );

        let command_error = resolution.command.as_ref().and_then(|command| {
            self.executor.execute(command).err().map(|err| {
                tracing::warn!(command = %command, error = %err, "Command failed");
                err.to_string()
            })
        });

        Ok(ActionOutcome {
            action: resolution.action,
            pending: resolution.pending,
            command: resolution.command,
            command_error,
        })
    }

    fn publish_away(
        &self,
        config: &AgentConfig,
        pending: &PendingStatus,
    ) -> Result<Option<String>, SlackError> {
        tracing::info!(
            status_text = %pending.status_text,
            status_emoji = %pending.status_emoji,
            "Setting away status"
        );
        self.slack
            .set_profile_status(&pending.status_text, &pending.status_emoji, 0)?;

        let away_message = pending
            .away_message
            .as_deref()
            .filter(|text| !text.trim().is_empty());
        match (config.channel(), away_message) {
            (Some(channel), Some(text)) => {
                tracing::info!(channel, "Sending away message");
                self.slack.post_message(channel, text).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn publish_back(
        &self,
        config: &AgentConfig,
        pending: &PendingStatus,
        last_message_id: Option<&str>,
        last_activity_at: i64,
    ) -> Result<BackNotice, SlackError> {
        tracing::info!("Clearing away status");
        self.slack.set_profile_status("", "", 0)?;

        let back_message = pending
            .back_message
            .as_deref()
            .filter(|text| !text.trim().is_empty());
        let (Some(channel), Some(text)) = (config.channel(), back_message) else {
            return Ok(BackNotice::Nothing);
        };

        let elapsed = self.clock.now() - last_activity_at;
        let emoji = config.back_emoji_name();
        if let Some(message_id) = last_message_id {
            if elapsed <= config.reaction_window_secs() && !emoji.is_empty() {
                tracing::info!(channel, message_id, elapsed, "Reacting to last message");
                self.slack.add_reaction(channel, emoji, message_id)?;
                return Ok(BackNotice::Reaction);
            }
        }

        tracing::info!(channel, elapsed, "Sending back message");
        self.slack.post_message(channel, text)?;
        Ok(BackNotice::Message)
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ScreenEventSink for TransitionEngine {
    fn on_screen_event(&self, event: ScreenEvent) {
        let outcome = self.handle(event);
        tracing::debug!(?event, ?outcome, "Screen event handled");
    }
}

fn skipped(reason: SkipReason) -> TransitionOutcome {
    tracing::debug!(?reason, "Transition skipped");
    TransitionOutcome::Skipped { reason }
}
