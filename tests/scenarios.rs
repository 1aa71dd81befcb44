//! End-to-end scenarios driven through the public service surface.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use audio_offset_manager::events::EventName;
use audio_offset_manager::monitor::{
    MonitorTimings, DIALOG_AUDIO_DELAY_SLIDER, DIALOG_AUDIO_SETTINGS,
};
use audio_offset_manager::policy::seek_back::SeekBackTimings;
use audio_offset_manager::ports::{
    AudioStream, ConfigPort, DialogPort, PlayerControlPort, PlayerId, ToastSink, VideoInfoPort,
};
use audio_offset_manager::retry::RetryPolicy;
use audio_offset_manager::{HostPorts, OffsetService, ServiceTunables};

struct SimControl {
    codec: Mutex<String>,
    delays: Mutex<Vec<(PlayerId, f64)>>,
    seeks: Mutex<Vec<(PlayerId, u32)>>,
}

impl Default for SimControl {
    fn default() -> Self {
        Self {
            codec: Mutex::new("truehd".into()),
            delays: Mutex::new(Vec::new()),
            seeks: Mutex::new(Vec::new()),
        }
    }
}

impl PlayerControlPort for SimControl {
    fn get_active_player(&self) -> Option<PlayerId> {
        Some(PlayerId(1))
    }

    fn get_audio_stream(&self, _player: PlayerId) -> Option<AudioStream> {
        Some(AudioStream {
            codec: self.codec.lock().unwrap().clone(),
            channels: Some(8),
        })
    }

    fn set_audio_delay(&self, player: PlayerId, seconds: f64) -> bool {
        self.delays.lock().unwrap().push((player, seconds));
        true
    }

    fn seek_backward(&self, player: PlayerId, seconds: u32) -> bool {
        self.seeks.lock().unwrap().push((player, seconds));
        true
    }
}

struct SimVideo;

impl VideoInfoPort for SimVideo {
    fn video_fps(&self) -> Option<f64> {
        Some(24.0)
    }

    fn hdr_type_detailed(&self) -> Option<String> {
        Some("hdr10".into())
    }

    fn hdr_type_fallback(&self) -> Option<String> {
        None
    }

    fn gamut_info(&self) -> Option<String> {
        None
    }
}

#[derive(Default)]
struct SimDialogs {
    dialog: Mutex<Option<u32>>,
    delay_text: Mutex<Option<String>>,
}

impl DialogPort for SimDialogs {
    fn current_dialog_id(&self) -> Option<u32> {
        *self.dialog.lock().unwrap()
    }

    fn audio_delay_text(&self) -> Option<String> {
        self.delay_text.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct SimConfig {
    bools: Mutex<HashMap<String, bool>>,
    ints: Mutex<HashMap<String, i64>>,
    writes: Mutex<HashMap<String, usize>>,
}

impl SimConfig {
    fn write_count(&self, key: &str) -> usize {
        self.writes.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

impl ConfigPort for SimConfig {
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.bools.lock().unwrap().get(key).copied()
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        self.ints.lock().unwrap().get(key).copied()
    }

    fn get_string(&self, _key: &str) -> Option<String> {
        None
    }

    fn set_bool(&self, key: &str, value: bool) {
        self.bools.lock().unwrap().insert(key.into(), value);
        *self.writes.lock().unwrap().entry(key.into()).or_insert(0) += 1;
    }

    fn set_int(&self, key: &str, value: i64) {
        self.ints.lock().unwrap().insert(key.into(), value);
        *self.writes.lock().unwrap().entry(key.into()).or_insert(0) += 1;
    }

    fn set_string(&self, _key: &str, _value: &str) {}
}

#[derive(Default)]
struct SimToasts {
    shown: Mutex<Vec<String>>,
}

impl ToastSink for SimToasts {
    fn show(&self, _title: &str, message: &str, _duration_ms: u64) {
        self.shown.lock().unwrap().push(message.into());
    }
}

struct World {
    control: Arc<SimControl>,
    dialogs: Arc<SimDialogs>,
    config: Arc<SimConfig>,
    toasts: Arc<SimToasts>,
    service: OffsetService,
}

fn tunables() -> ServiceTunables {
    ServiceTunables {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            jitter: 0.0,
            min_delay: Duration::from_millis(1),
        },
        debounce_delay: Duration::from_millis(10),
        seek_back: SeekBackTimings {
            cooldown: Duration::from_millis(200),
            settle: Duration::from_millis(10),
            unpause_grace: Duration::from_millis(10),
        },
        monitor: MonitorTimings {
            idle_poll: Duration::from_millis(5),
            dialog_poll: Duration::from_millis(5),
            slider_search_window: Duration::from_millis(200),
            search_poll: Duration::from_millis(5),
        },
    }
}

fn world(configure: impl Fn(&SimConfig)) -> World {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let control = Arc::new(SimControl::default());
    let dialogs = Arc::new(SimDialogs::default());
    let config = Arc::new(SimConfig::default());
    configure(&config);
    let toasts = Arc::new(SimToasts::default());
    let mut service = OffsetService::with_tunables(
        HostPorts {
            control: control.clone(),
            video: Arc::new(SimVideo),
            dialogs: dialogs.clone(),
            config: config.clone(),
            toasts: toasts.clone(),
        },
        tunables(),
    );
    service.start().unwrap();
    World {
        control,
        dialogs,
        config,
        toasts,
        service,
    }
}

fn wait_for(what: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_millis(1000);
    while !what() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn configured_delay_is_applied_with_notification() {
    let mut w = world(|c| {
        c.set_bool("enable_hdr10", true);
        c.set_bool("enable_fps_hdr10", true);
        c.set_bool("enable_notifications", true);
        c.set_int("hdr10_24_truehd", -75);
    });
    w.service.events().on_av_started();

    let delays = w.control.delays.lock().unwrap().clone();
    assert_eq!(delays.len(), 1);
    assert_eq!(delays[0].0, PlayerId(1));
    assert!((delays[0].1 - (-0.075)).abs() < 1e-9);
    let toasts = w.toasts.shown.lock().unwrap().clone();
    assert_eq!(toasts.len(), 1);
    assert!(toasts[0].starts_with("Offset applied: -75 ms"));
    w.service.stop().unwrap();
}

#[test]
fn disabled_hdr_type_produces_no_actuation() {
    let mut w = world(|c| {
        c.set_bool("enable_fps_hdr10", true);
        c.set_int("hdr10_24_truehd", -75);
    });
    w.service.events().on_av_started();
    assert!(w.control.delays.lock().unwrap().is_empty());
    assert!(w.toasts.shown.lock().unwrap().is_empty());
    w.service.stop().unwrap();
}

#[test]
fn manual_slider_change_is_persisted_once() {
    let mut w = world(|c| {
        c.set_bool("enable_hdr10", true);
        c.set_bool("enable_fps_hdr10", true);
        c.set_bool("enable_active_monitoring", true);
        c.set_int("hdr10_24_truehd", -75);
    });
    let adjustments = Arc::new(AtomicUsize::new(0));
    {
        let adjustments = adjustments.clone();
        w.service
            .bus()
            .subscribe_fn(EventName::UserAdjustment, move |_| {
                adjustments.fetch_add(1, Ordering::SeqCst);
            });
    }
    w.service.events().on_av_started();
    wait_for(|| w.service.is_monitoring());

    let drive_dialog = |text: &str| {
        *w.dialogs.dialog.lock().unwrap() = Some(DIALOG_AUDIO_SETTINGS);
        thread::sleep(Duration::from_millis(40));
        *w.dialogs.dialog.lock().unwrap() = Some(DIALOG_AUDIO_DELAY_SLIDER);
        *w.dialogs.delay_text.lock().unwrap() = Some(text.into());
        thread::sleep(Duration::from_millis(40));
        *w.dialogs.dialog.lock().unwrap() = None;
        thread::sleep(Duration::from_millis(40));
    };

    drive_dialog("-0.090 s");
    wait_for(|| adjustments.load(Ordering::SeqCst) == 1);
    assert_eq!(w.config.get_int("hdr10_24_truehd"), Some(-90));
    let writes = w.config.write_count("hdr10_24_truehd");

    // Reopened and closed at the same value: nothing further happens.
    drive_dialog("-0.090 s");
    assert_eq!(w.config.write_count("hdr10_24_truehd"), writes);
    assert_eq!(adjustments.load(Ordering::SeqCst), 1);
    w.service.stop().unwrap();
}

#[test]
fn genuine_codec_change_triggers_adjust_seek_back() {
    let mut w = world(|c| {
        c.set_bool("enable_seek_back_adjust", true);
        c.set_int("seek_back_adjust_seconds", 4);
    });
    w.service.events().on_av_started();

    // The host's startup settling burst: codec unchanged. It is promoted
    // once and consumes the adjust policy's one-shot suppression, but
    // issues no seek.
    w.service.events().on_av_change();
    thread::sleep(Duration::from_millis(80));
    assert!(w.control.seeks.lock().unwrap().is_empty());

    // A real mid-stream codec change masks its gap with a seek.
    *w.control.codec.lock().unwrap() = "eac3".into();
    w.service.events().on_av_change();
    wait_for(|| !w.control.seeks.lock().unwrap().is_empty());
    let seeks = w.control.seeks.lock().unwrap().clone();
    assert_eq!(seeks, vec![(PlayerId(1), 4)]);
    w.service.stop().unwrap();
}

#[test]
fn resume_seek_back_fires_once_within_cooldown() {
    let mut w = world(|c| {
        c.set_bool("enable_seek_back_resume", true);
        c.set_int("seek_back_resume_seconds", 4);
    });
    w.service.events().on_av_started();
    wait_for(|| !w.control.seeks.lock().unwrap().is_empty());

    // A second start inside the cooldown window is suppressed.
    w.service.events().on_av_started();
    thread::sleep(Duration::from_millis(100));
    let seeks = w.control.seeks.lock().unwrap().clone();
    assert_eq!(seeks.len(), 1);
    assert_eq!(seeks[0], (PlayerId(1), 4));
    w.service.stop().unwrap();
}
