//! Shared mock ports for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::ports::{
    AudioStream, ConfigPort, DialogPort, NotificationPort, PlayerControlPort, PlayerId,
    ToastSink, VideoInfoPort,
};
use crate::profile::StreamProfile;
use crate::retry::RetryPolicy;

/// Retry policy with negligible delays so retried paths stay fast in tests.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(1),
        jitter: 0.0,
        min_delay: Duration::from_millis(1),
    }
}

/// In-memory settings store that counts writes per key.
#[derive(Default)]
pub struct MockConfig {
    bools: Mutex<HashMap<String, bool>>,
    ints: Mutex<HashMap<String, i64>>,
    strings: Mutex<HashMap<String, String>>,
    writes: Mutex<HashMap<String, usize>>,
}

impl MockConfig {
    pub fn write_count(&self, key: &str) -> usize {
        self.writes.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    fn record_write(&self, key: &str) {
        *self.writes.lock().unwrap().entry(key.to_string()).or_insert(0) += 1;
    }
}

impl ConfigPort for MockConfig {
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.bools.lock().unwrap().get(key).copied()
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        self.ints.lock().unwrap().get(key).copied()
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.strings.lock().unwrap().get(key).cloned()
    }

    fn set_bool(&self, key: &str, value: bool) {
        self.bools.lock().unwrap().insert(key.to_string(), value);
        self.record_write(key);
    }

    fn set_int(&self, key: &str, value: i64) {
        self.ints.lock().unwrap().insert(key.to_string(), value);
        self.record_write(key);
    }

    fn set_string(&self, key: &str, value: &str) {
        self.strings
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        self.record_write(key);
    }
}

/// Scripted player control port recording every command it receives.
pub struct MockControl {
    player: Mutex<Option<PlayerId>>,
    /// Remaining scripted audio stream answers; the last entry repeats.
    streams: Mutex<Vec<Option<AudioStream>>>,
    stream_queries: AtomicUsize,
    delays: Mutex<Vec<(PlayerId, f64)>>,
    seeks: Mutex<Vec<(PlayerId, u32)>>,
    fail_set_delay: AtomicBool,
    fail_seek: AtomicBool,
}

impl MockControl {
    pub fn with_stream(codec: &str, channels: Option<u32>) -> Self {
        Self::with_stream_sequence(vec![(codec, channels)])
    }

    pub fn with_stream_sequence(sequence: Vec<(&str, Option<u32>)>) -> Self {
        let streams = sequence
            .into_iter()
            .map(|(codec, channels)| {
                Some(AudioStream {
                    codec: codec.to_string(),
                    channels,
                })
            })
            .collect();
        Self {
            player: Mutex::new(Some(PlayerId(1))),
            streams: Mutex::new(streams),
            stream_queries: AtomicUsize::new(0),
            delays: Mutex::new(Vec::new()),
            seeks: Mutex::new(Vec::new()),
            fail_set_delay: AtomicBool::new(false),
            fail_seek: AtomicBool::new(false),
        }
    }

    pub fn without_player() -> Self {
        let control = Self::with_stream_sequence(Vec::new());
        *control.player.lock().unwrap() = None;
        control
    }

    pub fn set_player(&self, player: Option<PlayerId>) {
        *self.player.lock().unwrap() = player;
    }

    pub fn set_stream(&self, codec: &str, channels: Option<u32>) {
        *self.streams.lock().unwrap() = vec![Some(AudioStream {
            codec: codec.to_string(),
            channels,
        })];
    }

    pub fn fail_set_delay(&self, fail: bool) {
        self.fail_set_delay.store(fail, Ordering::SeqCst);
    }

    pub fn fail_seek(&self, fail: bool) {
        self.fail_seek.store(fail, Ordering::SeqCst);
    }

    pub fn audio_stream_queries(&self) -> usize {
        self.stream_queries.load(Ordering::SeqCst)
    }

    /// Delays issued via `set_audio_delay`, in seconds.
    pub fn delays(&self) -> Vec<(PlayerId, f64)> {
        self.delays.lock().unwrap().clone()
    }

    pub fn seeks(&self) -> Vec<(PlayerId, u32)> {
        self.seeks.lock().unwrap().clone()
    }
}

impl PlayerControlPort for MockControl {
    fn get_active_player(&self) -> Option<PlayerId> {
        *self.player.lock().unwrap()
    }

    fn get_audio_stream(&self, _player: PlayerId) -> Option<AudioStream> {
        self.stream_queries.fetch_add(1, Ordering::SeqCst);
        let mut streams = self.streams.lock().unwrap();
        if streams.len() > 1 {
            streams.remove(0)
        } else {
            streams.first().cloned().flatten()
        }
    }

    fn set_audio_delay(&self, player: PlayerId, seconds: f64) -> bool {
        if self.fail_set_delay.load(Ordering::SeqCst) {
            return false;
        }
        self.delays.lock().unwrap().push((player, seconds));
        true
    }

    fn seek_backward(&self, player: PlayerId, seconds: u32) -> bool {
        if self.fail_seek.load(Ordering::SeqCst) {
            return false;
        }
        self.seeks.lock().unwrap().push((player, seconds));
        true
    }
}

/// Fixed-answer video probes.
pub struct MockVideo {
    fps: Mutex<Option<f64>>,
    detailed: Mutex<Option<String>>,
    fallback: Mutex<Option<String>>,
    gamut: Mutex<Option<String>>,
}

impl MockVideo {
    pub fn new(
        fps: Option<f64>,
        detailed: Option<&str>,
        fallback: Option<&str>,
        gamut: Option<&str>,
    ) -> Self {
        Self {
            fps: Mutex::new(fps),
            detailed: Mutex::new(detailed.map(String::from)),
            fallback: Mutex::new(fallback.map(String::from)),
            gamut: Mutex::new(gamut.map(String::from)),
        }
    }

    pub fn set_detailed(&self, value: Option<&str>) {
        *self.detailed.lock().unwrap() = value.map(String::from);
    }
}

impl VideoInfoPort for MockVideo {
    fn video_fps(&self) -> Option<f64> {
        *self.fps.lock().unwrap()
    }

    fn hdr_type_detailed(&self) -> Option<String> {
        self.detailed.lock().unwrap().clone()
    }

    fn hdr_type_fallback(&self) -> Option<String> {
        self.fallback.lock().unwrap().clone()
    }

    fn gamut_info(&self) -> Option<String> {
        self.gamut.lock().unwrap().clone()
    }
}

/// Settable dialog state for driving the active monitor.
#[derive(Default)]
pub struct MockDialogs {
    dialog: Mutex<Option<u32>>,
    delay_text: Mutex<Option<String>>,
}

impl MockDialogs {
    pub fn set_dialog(&self, id: Option<u32>) {
        *self.dialog.lock().unwrap() = id;
    }

    pub fn set_delay_text(&self, text: Option<&str>) {
        *self.delay_text.lock().unwrap() = text.map(String::from);
    }
}

impl DialogPort for MockDialogs {
    fn current_dialog_id(&self) -> Option<u32> {
        *self.dialog.lock().unwrap()
    }

    fn audio_delay_text(&self) -> Option<String> {
        self.delay_text.lock().unwrap().clone()
    }
}

/// Notification port recording every call.
#[derive(Default)]
pub struct RecordingNotifier {
    applied: Mutex<Vec<(i64, String)>>,
    saved: Mutex<Vec<(i64, String)>>,
}

impl RecordingNotifier {
    pub fn applied(&self) -> Vec<(i64, String)> {
        self.applied.lock().unwrap().clone()
    }

    pub fn saved(&self) -> Vec<(i64, String)> {
        self.saved.lock().unwrap().clone()
    }
}

impl NotificationPort for RecordingNotifier {
    fn notify_offset_applied(&self, delay_ms: i64, profile: &StreamProfile) {
        self.applied
            .lock()
            .unwrap()
            .push((delay_ms, profile.setting_id()));
    }

    fn notify_manual_offset_saved(&self, delay_ms: i64, profile: &StreamProfile) {
        self.saved
            .lock()
            .unwrap()
            .push((delay_ms, profile.setting_id()));
    }
}

/// Toast sink recording every shown toast.
#[derive(Default)]
pub struct RecordingToasts {
    shown: Mutex<Vec<(String, String, u64)>>,
}

impl RecordingToasts {
    pub fn shown(&self) -> Vec<(String, String, u64)> {
        self.shown.lock().unwrap().clone()
    }
}

impl ToastSink for RecordingToasts {
    fn show(&self, title: &str, message: &str, duration_ms: u64) {
        self.shown
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string(), duration_ms));
    }
}
