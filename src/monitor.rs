//! Active monitor
//!
//! The host offers no notification when the user drags the audio-delay
//! slider; the only observable is the id of the top-level dialog and the
//! slider's displayed text. This worker polls that surface through a small
//! state machine: watch for the audio settings panel, follow the handoff to
//! the delay slider within a bounded search window, track the displayed
//! value while the slider is open, and persist the final value once the
//! slider closes if it differs from what is stored for the current profile.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::events::{EventBus, PlayerEvent};
use crate::ports::DialogPort;
use crate::profile::StreamProfile;
use crate::shutdown::Shutdown;

/// Host dialog id of the audio settings panel.
pub const DIALOG_AUDIO_SETTINGS: u32 = 10124;
/// Host dialog id of the audio delay slider.
pub const DIALOG_AUDIO_DELAY_SLIDER: u32 = 10145;

#[derive(Debug, Clone, Copy)]
pub struct MonitorTimings {
    /// Poll interval while no dialog of interest is open.
    pub idle_poll: Duration,
    /// Poll interval while the settings panel or slider is open.
    pub dialog_poll: Duration,
    /// How long the slider may take to appear after the settings panel
    /// closes.
    pub slider_search_window: Duration,
    pub search_poll: Duration,
}

impl Default for MonitorTimings {
    fn default() -> Self {
        Self {
            idle_poll: Duration::from_secs(1),
            dialog_poll: Duration::from_millis(250),
            slider_search_window: Duration::from_secs(1),
            search_poll: Duration::from_millis(100),
        }
    }
}

struct MonitorSession {
    dialogs: Arc<dyn DialogPort>,
    settings: Settings,
    bus: Arc<EventBus>,
    profile: StreamProfile,
    /// Last delay persisted for this profile, in ms. Seeded from config at
    /// session start; an unconfigured profile counts as 0, matching the
    /// slider's default position.
    stored: Mutex<i64>,
    stop: Shutdown,
    global: Shutdown,
    timings: MonitorTimings,
}

impl MonitorSession {
    /// Returns true when the session should end.
    fn pause(&self, duration: Duration) -> bool {
        self.stop.wait_timeout(duration) || self.global.is_requested()
    }

    fn run(&self) {
        debug!("active monitor running for {}", self.profile);
        loop {
            if self.stop.is_requested() || self.global.is_requested() {
                return;
            }
            if self.dialogs.current_dialog_id() == Some(DIALOG_AUDIO_SETTINGS) {
                if self.follow_settings_panel() {
                    return;
                }
            } else if self.pause(self.timings.idle_poll) {
                return;
            }
        }
    }

    /// Settings panel is open: wait for it to close, then look for the
    /// slider within the bounded search window. Returns true on stop.
    fn follow_settings_panel(&self) -> bool {
        debug!("audio settings panel open");
        while self.dialogs.current_dialog_id() == Some(DIALOG_AUDIO_SETTINGS) {
            if self.pause(self.timings.dialog_poll) {
                return true;
            }
        }
        let deadline = Instant::now() + self.timings.slider_search_window;
        loop {
            if self.dialogs.current_dialog_id() == Some(DIALOG_AUDIO_DELAY_SLIDER) {
                return self.follow_slider();
            }
            if Instant::now() >= deadline {
                debug!("delay slider did not appear within the search window");
                return false;
            }
            if self.pause(self.timings.search_poll) {
                return true;
            }
        }
    }

    /// Slider is open: track the displayed value until the slider closes,
    /// then persist a change if one happened. Returns true on stop.
    fn follow_slider(&self) -> bool {
        debug!("audio delay slider open");
        let mut observed: Option<i64> = None;
        while self.dialogs.current_dialog_id() == Some(DIALOG_AUDIO_DELAY_SLIDER) {
            if let Some(text) = self.dialogs.audio_delay_text() {
                match parse_delay_ms(&text) {
                    Some(ms) => observed = Some(ms),
                    // Treated as no change observed this poll.
                    None => warn!("unparseable delay text '{text}'"),
                }
            }
            if self.pause(self.timings.dialog_poll) {
                return true;
            }
        }
        self.finish_slider_session(observed);
        false
    }

    fn finish_slider_session(&self, observed: Option<i64>) {
        let Some(ms) = observed else {
            debug!("slider closed without a readable value");
            return;
        };
        let mut stored = self.stored.lock().unwrap();
        if *stored == ms {
            debug!("slider closed unchanged at {ms}ms");
            return;
        }
        let setting_id = self.profile.setting_id();
        info!("manual delay {ms}ms saved for '{setting_id}'");
        self.settings.set_offset_ms(&setting_id, ms);
        *stored = ms;
        drop(stored);
        self.bus.publish(&PlayerEvent::UserAdjustment);
    }
}

/// One running dialog-polling session. Created by the offset policy while
/// its governing conditions hold, joined synchronously on stop.
pub struct ActiveMonitor {
    stop_signal: Shutdown,
    worker: Option<JoinHandle<()>>,
    profile: StreamProfile,
}

impl ActiveMonitor {
    pub fn start(
        dialogs: Arc<dyn DialogPort>,
        settings: Settings,
        bus: Arc<EventBus>,
        profile: StreamProfile,
        global: Shutdown,
        timings: MonitorTimings,
    ) -> crate::Result<Self> {
        let stop_signal = Shutdown::new();
        let stored = settings.offset_ms(&profile).unwrap_or(0);
        let session = MonitorSession {
            dialogs,
            settings,
            bus,
            profile: profile.clone(),
            stored: Mutex::new(stored),
            stop: stop_signal.clone(),
            global,
            timings,
        };
        let worker = thread::Builder::new()
            .name("active-monitor".into())
            .spawn(move || session.run())?;
        Ok(Self {
            stop_signal,
            worker: Some(worker),
            profile,
        })
    }

    pub fn profile(&self) -> &StreamProfile {
        &self.profile
    }

    /// Signal the worker and join it. The worker is fully quiesced when
    /// this returns.
    pub fn stop(mut self) {
        self.stop_signal.request();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("active monitor worker panicked");
            }
        }
        debug!("active monitor stopped");
    }
}

/// Convert the host's displayed delay (e.g. `"-0.075 s"`) to milliseconds.
fn parse_delay_ms(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    let number = trimmed.strip_suffix('s').unwrap_or(trimmed).trim_end();
    let seconds: f64 = number.parse().ok()?;
    Some((seconds * 1000.0).round() as i64)
}
