//! Playback event normalization
//!
//! The host's raw player callbacks land here. The manager keeps the shared
//! playback state current, debounces AV-change bursts, and republishes
//! everything as [`PlayerEvent`]s on the bus for the policy subscribers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::debounce::AvChangeDebouncer;
use crate::events::{EventBus, EventName, PlayerEvent};
use crate::profile::AudioFormat;
use crate::resolver::StreamProfileResolver;
use crate::shutdown::Shutdown;

/// Shared playback session state, readable by every policy.
#[derive(Debug, Clone, Default)]
pub struct PlaybackState {
    /// When AV playback last started; `None` while stopped.
    pub start_time: Option<DateTime<Utc>>,
    pub av_started: bool,
    pub last_event: Option<EventName>,
    pub last_audio_codec: Option<AudioFormat>,
}

impl PlaybackState {
    pub fn is_active(&self) -> bool {
        self.av_started
    }

    /// Time since AV start, if playing.
    pub fn playback_age(&self) -> Option<chrono::Duration> {
        self.start_time.map(|start| Utc::now() - start)
    }
}

pub struct PlaybackEventManager {
    bus: Arc<EventBus>,
    resolver: Arc<StreamProfileResolver>,
    state: Arc<Mutex<PlaybackState>>,
    debouncer: Arc<AvChangeDebouncer>,
}

impl PlaybackEventManager {
    pub fn new(
        bus: Arc<EventBus>,
        resolver: Arc<StreamProfileResolver>,
        shutdown: Shutdown,
    ) -> Self {
        let state = Arc::new(Mutex::new(PlaybackState::default()));
        let is_active = {
            let state = state.clone();
            Arc::new(move || state.lock().unwrap().av_started)
        };
        let on_stable = {
            let bus = bus.clone();
            let state = state.clone();
            Arc::new(move |codec: AudioFormat| {
                state.lock().unwrap().last_audio_codec = Some(codec);
                publish_event(&bus, &state, PlayerEvent::AvChange);
            })
        };
        let debouncer = Arc::new(AvChangeDebouncer::new(
            resolver.clone(),
            shutdown,
            is_active,
            on_stable,
        ));
        Self {
            bus,
            resolver,
            state,
            debouncer,
        }
    }

    pub fn with_debounce_delay(self, delay: Duration) -> Self {
        self.debouncer.set_verify_delay(delay);
        self
    }

    /// Shared handle to the playback state, for policies and snapshots.
    pub fn state_handle(&self) -> Arc<Mutex<PlaybackState>> {
        self.state.clone()
    }

    pub fn snapshot(&self) -> PlaybackState {
        self.state.lock().unwrap().clone()
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().av_started
    }

    /// Audio and video are up. Publishes first so subscribers resolve the
    /// fresh profile, then records the session's initial codec.
    pub fn on_av_started(&self) {
        info!("AV started");
        {
            let mut state = self.state.lock().unwrap();
            state.start_time = Some(Utc::now());
            state.av_started = true;
        }
        publish_event(&self.bus, &self.state, PlayerEvent::AvStarted);
        let codec = self
            .resolver
            .current()
            .map(|profile| profile.audio_format)
            .filter(|codec| *codec != AudioFormat::Unknown);
        self.state.lock().unwrap().last_audio_codec = codec;
        // The debouncer starts each session with no stable codec. The
        // host's startup AV-change burst therefore promotes exactly once,
        // and that promotion is what consumes the seek-back policy's
        // one-shot suppression.
        self.debouncer.reset();
    }

    /// Raw AV-change callback. Not republished directly; a verification is
    /// armed and only a codec change that survives it reaches the bus.
    pub fn on_av_change(&self) {
        debug!("raw AV change received, arming verification");
        AvChangeDebouncer::trigger(&self.debouncer);
    }

    pub fn on_playback_stopped(&self) {
        info!("playback stopped");
        self.end_session();
        publish_event(&self.bus, &self.state, PlayerEvent::PlaybackStopped);
    }

    pub fn on_playback_ended(&self) {
        info!("playback ended");
        self.end_session();
        publish_event(&self.bus, &self.state, PlayerEvent::PlaybackEnded);
    }

    pub fn on_playback_paused(&self) {
        publish_event(&self.bus, &self.state, PlayerEvent::PlaybackPaused);
    }

    pub fn on_playback_resumed(&self) {
        publish_event(&self.bus, &self.state, PlayerEvent::PlaybackResumed);
    }

    pub fn on_playback_seek(&self, time_ms: i64, offset_ms: i64) {
        publish_event(
            &self.bus,
            &self.state,
            PlayerEvent::PlaybackSeek { time_ms, offset_ms },
        );
    }

    pub fn on_playback_seek_chapter(&self, chapter: i32) {
        publish_event(
            &self.bus,
            &self.state,
            PlayerEvent::PlaybackSeekChapter { chapter },
        );
    }

    pub fn on_playback_speed_changed(&self, speed: i32) {
        publish_event(
            &self.bus,
            &self.state,
            PlayerEvent::PlaybackSpeedChanged { speed },
        );
    }

    fn end_session(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.start_time = None;
            state.av_started = false;
            state.last_audio_codec = None;
        }
        self.debouncer.reset();
        self.resolver.clear();
    }
}

/// Publish and record the event name as the last seen one. Recording after
/// dispatch keeps `last_event` meaning "last fully handled event".
fn publish_event(bus: &EventBus, state: &Mutex<PlaybackState>, event: PlayerEvent) {
    bus.publish(&event);
    state.lock().unwrap().last_event = Some(event.name());
}
