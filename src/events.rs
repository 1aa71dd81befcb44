//! Event types and the in-process event bus
//!
//! The bus is a plain subscription registry with synchronous, ordered
//! dispatch: `publish` invokes every handler for the event's name, in
//! subscription order, on the publisher's thread, and returns only after all
//! of them ran. A panicking handler is isolated and logged; the remaining
//! handlers still run. Nothing is buffered or persisted — a publish with no
//! subscribers is a no-op.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Canonical event names, used to key subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventName {
    AvStarted,
    #[serde(rename = "ON_AV_CHANGE")]
    AvChange,
    PlaybackStopped,
    PlaybackEnded,
    PlaybackPaused,
    PlaybackResumed,
    PlaybackSeek,
    PlaybackSeekChapter,
    PlaybackSpeedChanged,
    UserAdjustment,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::AvStarted => "AV_STARTED",
            EventName::AvChange => "ON_AV_CHANGE",
            EventName::PlaybackStopped => "PLAYBACK_STOPPED",
            EventName::PlaybackEnded => "PLAYBACK_ENDED",
            EventName::PlaybackPaused => "PLAYBACK_PAUSED",
            EventName::PlaybackResumed => "PLAYBACK_RESUMED",
            EventName::PlaybackSeek => "PLAYBACK_SEEK",
            EventName::PlaybackSeekChapter => "PLAYBACK_SEEK_CHAPTER",
            EventName::PlaybackSpeedChanged => "PLAYBACK_SPEED_CHANGED",
            EventName::UserAdjustment => "USER_ADJUSTMENT",
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized playback events published on the bus.
///
/// These are transient dispatch units, not persisted anywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Audio and video are up; stream characteristics are resolvable.
    AvStarted,
    /// A codec change survived debounce verification.
    AvChange,
    PlaybackStopped,
    PlaybackEnded,
    PlaybackPaused,
    PlaybackResumed,
    PlaybackSeek { time_ms: i64, offset_ms: i64 },
    PlaybackSeekChapter { chapter: i32 },
    PlaybackSpeedChanged { speed: i32 },
    /// The active monitor detected and persisted a manual delay change.
    UserAdjustment,
}

impl PlayerEvent {
    pub fn name(&self) -> EventName {
        match self {
            PlayerEvent::AvStarted => EventName::AvStarted,
            PlayerEvent::AvChange => EventName::AvChange,
            PlayerEvent::PlaybackStopped => EventName::PlaybackStopped,
            PlayerEvent::PlaybackEnded => EventName::PlaybackEnded,
            PlayerEvent::PlaybackPaused => EventName::PlaybackPaused,
            PlayerEvent::PlaybackResumed => EventName::PlaybackResumed,
            PlayerEvent::PlaybackSeek { .. } => EventName::PlaybackSeek,
            PlayerEvent::PlaybackSeekChapter { .. } => EventName::PlaybackSeekChapter,
            PlayerEvent::PlaybackSpeedChanged { .. } => EventName::PlaybackSpeedChanged,
            PlayerEvent::UserAdjustment => EventName::UserAdjustment,
        }
    }
}

/// Subscription handle returned by [`EventBus::subscribe`]; closures have no
/// identity in Rust, so unsubscription goes through this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

pub type Handler = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;

/// Synchronous publish/subscribe registry.
pub struct EventBus {
    subscribers: Mutex<HashMap<EventName, Vec<(HandlerId, Handler)>>>,
    next_id: AtomicU64,
    log_runtimes: bool,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_runtime_logging(false)
    }

    /// `log_runtimes` enables per-handler latency logging, useful when a
    /// slow subscriber is suspected of stalling the callback thread.
    pub fn with_runtime_logging(log_runtimes: bool) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            log_runtimes,
        }
    }

    pub fn subscribe(&self, name: EventName, handler: Handler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.entry(name).or_default().push((id, handler));
        id
    }

    pub fn subscribe_fn<F>(&self, name: EventName, handler: F) -> HandlerId
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.subscribe(name, Arc::new(handler))
    }

    pub fn unsubscribe(&self, name: EventName, id: HandlerId) {
        let mut subscribers = self.subscribers.lock().unwrap();
        if let Some(handlers) = subscribers.get_mut(&name) {
            handlers.retain(|(handler_id, _)| *handler_id != id);
            if handlers.is_empty() {
                subscribers.remove(&name);
            }
        }
    }

    /// Dispatch `event` to all subscribers of its name, in subscription
    /// order, on the calling thread. Handler panics are contained so the
    /// remaining handlers still run.
    pub fn publish(&self, event: &PlayerEvent) {
        let name = event.name();
        // Snapshot outside the lock so handlers can (un)subscribe reentrantly.
        let handlers: Vec<(HandlerId, Handler)> = {
            let subscribers = self.subscribers.lock().unwrap();
            subscribers.get(&name).cloned().unwrap_or_default()
        };
        for (id, handler) in handlers {
            let start = Instant::now();
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                error!("{name}: handler {id:?} panicked; continuing with remaining handlers");
            }
            if self.log_runtimes {
                debug!(
                    "{name} handled by {id:?} in {:.1}ms",
                    start.elapsed().as_secs_f64() * 1000.0
                );
            }
        }
    }

    pub fn subscriber_count(&self, name: EventName) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .get(&name)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
