//! # afk-core
//!
//! Presence logic for the AFK agent: the away/back state machine, action
//! resolution, configuration, and the Slack client it drives.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Slack calls are blocking.
//! - **Single writer**: [`TransitionEngine`] owns the status and pending
//!   status; every trigger source goes through it.
//! - **Best effort**: Remote failures are logged and never change the
//!   local presence decision.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use afk_core::{ConfigStore, SlackClient, TransitionEngine};
//! use std::sync::Arc;
//!
//! let config = Arc::new(ConfigStore::load(afk_core::default_config_path()?)?);
//! let slack = Arc::new(SlackClient::new(config.snapshot().token.clone())?);
//! let engine = TransitionEngine::new(config, slack);
//! engine.screen_locked();
//! ```

pub mod bridge;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod liveness;
pub mod lock_source;
pub mod resolver;
pub mod slack;
pub mod status;

pub use bridge::{EventBridge, LockStateSource, ScreenEvent, ScreenEventSink, Shutdown};
pub use commands::{CommandExecutor, SystemCommand, SystemCommandExecutor};
pub use config::{
    default_config_path, ensure_config, load_config, ActionEntry, AgentConfig, ConfigInit,
    ConfigStore, MessageSetting, ReloadPolicy,
};
pub use engine::{
    ActionOutcome, BackNotice, Clock, SkipReason, SystemClock, TransitionEngine,
    TransitionOutcome,
};
pub use error::{AfkError, Result};
pub use liveness::{ClientLiveness, ProcessLiveness};
pub use lock_source::platform_source;
pub use resolver::{resolve, Resolution, ResolveError};
pub use slack::{SlackApi, SlackClient, SlackError};
pub use status::{PendingStatus, Presence, Status, StatusSnapshot};
