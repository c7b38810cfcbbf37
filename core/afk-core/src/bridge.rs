//! Event bridge: turns OS lock-state observations into screen events.
//!
//! A [`LockStateSource`] is polled on its own thread. The first observation is
//! only a baseline; each later change produces exactly one event.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Consecutive failed polls after which failures are logged at debug level only.
const LOUD_FAILURE_LIMIT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenEvent {
    Locked,
    Unlocked,
}

pub trait LockStateSource: Send {
    fn name(&self) -> &'static str;
    fn is_locked(&mut self) -> Result<bool, String>;
}

pub trait ScreenEventSink: Send + Sync {
    fn on_screen_event(&self, event: ScreenEvent);
}

/// Cooperative stop signal shared by the command server and the bridge.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct EventBridge<S: LockStateSource> {
    source: S,
    interval: Duration,
    last_state: Option<bool>,
    failures: u32,
}

impl<S: LockStateSource> EventBridge<S> {
    pub fn new(source: S) -> Self {
        Self::with_interval(source, LOCK_POLL_INTERVAL)
    }

    pub fn with_interval(source: S, interval: Duration) -> Self {
        Self {
            source,
            interval,
            last_state: None,
            failures: 0,
        }
    }

    /// Polls once and returns the event to deliver, if the state changed.
    pub fn poll(&mut self) -> Option<ScreenEvent> {
        let locked = match self.source.is_locked() {
            Ok(locked) => {
                self.failures = 0;
                locked
            }
            Err(err) => {
                self.failures = self.failures.saturating_add(1);
                if self.failures <= LOUD_FAILURE_LIMIT {
                    tracing::warn!(source = self.source.name(), error = %err, "Failed to poll lock state");
                } else {
                    tracing::debug!(source = self.source.name(), error = %err, "Failed to poll lock state");
                }
                return None;
            }
        };

        let previous = self.last_state.replace(locked);
        match previous {
            Some(previous) if previous != locked => Some(if locked {
                ScreenEvent::Locked
            } else {
                ScreenEvent::Unlocked
            }),
            _ => None,
        }
    }

    /// Runs until `shutdown` is requested, delivering events to `sink`.
    pub fn run(mut self, sink: &dyn ScreenEventSink, shutdown: &Shutdown) {
        tracing::info!(source = self.source.name(), "Event bridge started");
        while !shutdown.is_requested() {
            if let Some(event) = self.poll() {
                sink.on_screen_event(event);
            }
            thread::sleep(self.interval);
        }
        tracing::info!("Event bridge stopped");
    }
}
