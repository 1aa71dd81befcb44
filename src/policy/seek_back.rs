//! Seek-back policy
//!
//! A delay change leaves a short audible gap; rewinding a few seconds masks
//! it. Each trigger kind has its own enable toggle, duration and cooldown
//! window, while a single in-flight flag keeps seeks from overlapping when
//! several triggers land close together.
//!
//! The cooldown timestamp is recorded when a seek is accepted, not when the
//! RPC completes, so the window measures trigger spacing rather than trigger
//! spacing plus the settle delay. A failed seek rolls its timestamp back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::events::{EventBus, EventName, HandlerId};
use crate::ports::PlayerControlPort;
use crate::retry::RetryPolicy;
use crate::shutdown::Shutdown;

/// What prompted a seek-back. Each kind is configured and rate-limited
/// independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeekKind {
    /// Playback started (typically from a resume point).
    Resume,
    /// A verified mid-stream codec change re-applied the offset.
    Adjust,
    /// Playback resumed from pause.
    Unpause,
    /// The user manually changed the delay via the host dialog.
    Change,
}

impl SeekKind {
    /// Config key fragment for this kind.
    pub fn key(&self) -> &'static str {
        match self {
            SeekKind::Resume => "resume",
            SeekKind::Adjust => "adjust",
            SeekKind::Unpause => "unpause",
            SeekKind::Change => "change",
        }
    }
}

impl std::fmt::Display for SeekKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SeekBackTimings {
    /// Minimum spacing between accepted seeks of the same kind.
    pub cooldown: Duration,
    /// Wait before actually seeking, letting the stream settle after a
    /// delay change.
    pub settle: Duration,
    /// Wait after a resume callback before treating playback as unpaused.
    pub unpause_grace: Duration,
}

impl Default for SeekBackTimings {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(2),
            settle: Duration::from_secs(2),
            unpause_grace: Duration::from_millis(500),
        }
    }
}

#[derive(Default)]
struct SeekBackState {
    paused: bool,
    /// The first AV change after start reflects resolver settling, not a
    /// real mid-stream change, and is always swallowed.
    initial_av_change_seen: bool,
    seek_in_progress: bool,
    last_seek_by_kind: HashMap<SeekKind, Instant>,
}

struct SeekBackInner {
    control: Arc<dyn PlayerControlPort>,
    settings: Settings,
    shutdown: Shutdown,
    timings: SeekBackTimings,
    retry: RetryPolicy,
    state: Mutex<SeekBackState>,
}

impl SeekBackInner {
    /// Run the guard chain and, if the seek is accepted, mark it in flight
    /// and stamp its cooldown slot. Returns the seconds to seek.
    fn decide(&self, kind: SeekKind) -> Option<u32> {
        let (enabled, seconds) = self.settings.seek_back_config(kind);
        let mut state = self.state.lock().unwrap();
        if state.paused {
            debug!("seek-back {kind} skipped, playback paused");
            return None;
        }
        if let Some(last) = state.last_seek_by_kind.get(&kind) {
            if last.elapsed() < self.timings.cooldown {
                debug!("seek-back {kind} skipped, within cooldown");
                return None;
            }
        }
        if state.seek_in_progress {
            debug!("seek-back {kind} skipped, another seek in flight");
            return None;
        }
        if !enabled || seconds == 0 {
            debug!("seek-back {kind} not configured");
            return None;
        }
        state.seek_in_progress = true;
        state.last_seek_by_kind.insert(kind, Instant::now());
        Some(seconds)
    }

    fn trigger(this: &Arc<Self>, kind: SeekKind) {
        let Some(seconds) = this.decide(kind) else {
            return;
        };
        let inner = Arc::clone(this);
        let spawned = thread::Builder::new()
            .name("seek-back".into())
            .spawn(move || inner.run_seek(kind, seconds));
        if let Err(e) = spawned {
            warn!("could not spawn seek-back worker: {e}");
            let mut state = this.state.lock().unwrap();
            state.seek_in_progress = false;
            state.last_seek_by_kind.remove(&kind);
        }
    }

    fn run_seek(&self, kind: SeekKind, seconds: u32) {
        if self.shutdown.wait_timeout(self.timings.settle) {
            self.state.lock().unwrap().seek_in_progress = false;
            return;
        }
        let player = self.retry.run(&self.shutdown, "active player", || {
            self.control.get_active_player()
        });
        let succeeded = match player {
            None => {
                warn!("seek-back {kind} abandoned, no active player");
                false
            }
            Some(pid) => {
                if self.control.seek_backward(pid, seconds) {
                    info!("seek-back {kind}: rewound {seconds}s");
                    true
                } else {
                    warn!("seek-back {kind}: seek call failed");
                    false
                }
            }
        };
        let mut state = self.state.lock().unwrap();
        state.seek_in_progress = false;
        if !succeeded {
            state.last_seek_by_kind.remove(&kind);
        }
    }

    fn on_av_started(this: &Arc<Self>) {
        {
            let mut state = this.state.lock().unwrap();
            state.paused = false;
            state.initial_av_change_seen = false;
        }
        Self::trigger(this, SeekKind::Resume);
    }

    fn on_av_change(this: &Arc<Self>) {
        {
            let mut state = this.state.lock().unwrap();
            if !state.initial_av_change_seen {
                state.initial_av_change_seen = true;
                debug!("initial AV change swallowed by seek-back policy");
                return;
            }
        }
        Self::trigger(this, SeekKind::Adjust);
    }

    /// Resume callbacks arrive slightly before the host truly unpauses, so
    /// the grace wait and the seek both happen off the callback thread.
    fn on_resumed(this: &Arc<Self>) {
        let inner = Arc::clone(this);
        let spawned = thread::Builder::new()
            .name("seek-back".into())
            .spawn(move || {
                if inner.shutdown.wait_timeout(inner.timings.unpause_grace) {
                    return;
                }
                inner.state.lock().unwrap().paused = false;
                let Some(seconds) = inner.decide(SeekKind::Unpause) else {
                    return;
                };
                inner.run_seek(SeekKind::Unpause, seconds);
            });
        if let Err(e) = spawned {
            warn!("could not spawn seek-back worker: {e}");
        }
    }

    fn reset(&self) {
        *self.state.lock().unwrap() = SeekBackState::default();
    }
}

/// Event-driven seek-back decisions. Create, then [`start`](Self::start) to
/// subscribe its handlers.
pub struct SeekBackPolicyEngine {
    bus: Arc<EventBus>,
    inner: Arc<SeekBackInner>,
    subscriptions: Vec<(EventName, HandlerId)>,
}

impl SeekBackPolicyEngine {
    pub fn new(
        bus: Arc<EventBus>,
        control: Arc<dyn PlayerControlPort>,
        settings: Settings,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            bus,
            inner: Arc::new(SeekBackInner {
                control,
                settings,
                shutdown,
                timings: SeekBackTimings::default(),
                retry: RetryPolicy::default(),
                state: Mutex::new(SeekBackState::default()),
            }),
            subscriptions: Vec::new(),
        }
    }

    /// No effect after `start`; the subscriptions hold their own handles
    /// to the engine state.
    pub fn with_timings(mut self, timings: SeekBackTimings) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.timings = timings,
            None => warn!("seek-back timings ignored, engine already started"),
        }
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.retry = retry,
            None => warn!("retry policy ignored, engine already started"),
        }
        self
    }

    pub fn start(&mut self) {
        if !self.subscriptions.is_empty() {
            return;
        }
        let subs: [(EventName, fn(&Arc<SeekBackInner>)); 6] = [
            (EventName::AvStarted, SeekBackInner::on_av_started),
            (EventName::AvChange, SeekBackInner::on_av_change),
            (EventName::PlaybackResumed, SeekBackInner::on_resumed),
            (EventName::PlaybackPaused, |inner| {
                inner.state.lock().unwrap().paused = true;
            }),
            (EventName::PlaybackStopped, |inner| inner.reset()),
            (EventName::PlaybackEnded, |inner| inner.reset()),
        ];
        for (name, handler) in subs {
            let inner = self.inner.clone();
            let id = self.bus.subscribe_fn(name, move |_| handler(&inner));
            self.subscriptions.push((name, id));
        }
        // USER_ADJUSTMENT carries no suppression, it is always a deliberate
        // user action.
        let inner = self.inner.clone();
        let id = self.bus.subscribe_fn(EventName::UserAdjustment, move |_| {
            SeekBackInner::trigger(&inner, SeekKind::Change);
        });
        self.subscriptions.push((EventName::UserAdjustment, id));
    }

    pub fn stop(&mut self) {
        for (name, id) in self.subscriptions.drain(..) {
            self.bus.unsubscribe(name, id);
        }
        self.inner.reset();
    }
}
