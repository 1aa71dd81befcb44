//! AV-change debouncing
//!
//! Hosts emit bursts of AV-change callbacks while a stream settles (codec
//! renegotiation, passthrough handoff, chapter boundaries). Reacting
//! immediately causes duplicate or wrong offset application, so a raw signal
//! only nominates a candidate codec; a one-shot worker re-resolves after the
//! verify delay and promotes the candidate to stable only if it still holds.
//! Candidates supersede each other through a sequence counter, so only the
//! last signal in a burst is ever verified.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::profile::AudioFormat;
use crate::resolver::StreamProfileResolver;
use crate::shutdown::Shutdown;

pub const DEFAULT_VERIFY_DELAY: Duration = Duration::from_secs(1);

/// Asks whether playback is still active.
pub type ActiveProbe = Arc<dyn Fn() -> bool + Send + Sync>;

/// Invoked with the new codec when a change survives verification.
pub type StableCallback = Arc<dyn Fn(AudioFormat) + Send + Sync>;

struct DebounceState {
    /// Incremented on every candidate; a pending verification whose
    /// sequence no longer matches has been superseded and does nothing.
    sequence: u64,
    last_stable: Option<AudioFormat>,
}

pub struct AvChangeDebouncer {
    resolver: Arc<StreamProfileResolver>,
    shutdown: Shutdown,
    verify_delay: Mutex<Duration>,
    state: Mutex<DebounceState>,
    is_active: ActiveProbe,
    on_stable: StableCallback,
}

impl AvChangeDebouncer {
    pub fn new(
        resolver: Arc<StreamProfileResolver>,
        shutdown: Shutdown,
        is_active: ActiveProbe,
        on_stable: StableCallback,
    ) -> Self {
        Self {
            resolver,
            shutdown,
            verify_delay: Mutex::new(DEFAULT_VERIFY_DELAY),
            state: Mutex::new(DebounceState {
                sequence: 0,
                last_stable: None,
            }),
            is_active,
            on_stable,
        }
    }

    pub fn set_verify_delay(&self, delay: Duration) {
        *self.verify_delay.lock().unwrap() = delay;
    }

    /// Seed the stable codec at playback start so the first verified change
    /// compares against the stream's initial codec.
    pub fn note_stable(&self, codec: Option<AudioFormat>) {
        self.state.lock().unwrap().last_stable = codec;
    }

    /// Cancel any pending verification and forget the stable codec
    /// (playback stopped).
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.sequence += 1;
        state.last_stable = None;
    }

    /// Handle a raw change signal: nominate the currently resolved codec as
    /// a candidate and arm its verification, superseding any pending one.
    pub fn trigger(this: &Arc<Self>) {
        if !(this.is_active)() {
            debug!("raw AV change ignored, playback not active");
            return;
        }
        let Some(candidate) = this.resolver.current_audio_codec() else {
            debug!("raw AV change ignored, codec not resolvable yet");
            return;
        };
        let sequence = {
            let mut state = this.state.lock().unwrap();
            if state.last_stable == Some(candidate) {
                debug!("raw AV change ignored, codec still {candidate}");
                return;
            }
            state.sequence += 1;
            state.sequence
        };
        debug!("candidate codec {candidate}, verification armed");
        let delay = *this.verify_delay.lock().unwrap();
        let debouncer = Arc::clone(this);
        let spawned = thread::Builder::new()
            .name("av-debounce".into())
            .spawn(move || {
                if debouncer.shutdown.wait_timeout(delay) {
                    return;
                }
                debouncer.verify(sequence, candidate);
            });
        if let Err(e) = spawned {
            warn!("could not spawn av-debounce worker: {e}");
        }
    }

    fn verify(&self, sequence: u64, candidate: AudioFormat) {
        if self.state.lock().unwrap().sequence != sequence {
            debug!("verification of {candidate} superseded");
            return;
        }
        if !(self.is_active)() {
            debug!("verification of {candidate} dropped, playback ended");
            return;
        }
        let Some(codec) = self.resolver.current_audio_codec() else {
            debug!("codec unresolvable at verification, discarding {candidate}");
            return;
        };
        if codec != candidate {
            debug!("transient flicker: candidate {candidate}, now {codec}");
            return;
        }
        {
            let mut state = self.state.lock().unwrap();
            if state.sequence != sequence {
                return;
            }
            state.last_stable = Some(codec);
        }
        debug!("codec change to {codec} verified stable");
        (self.on_stable)(codec);
    }
}
