//! User-facing notifications
//!
//! Implements [`NotificationPort`] over the host's raw toast surface. The
//! decision engines can emit the same notice twice in quick succession (an
//! AV change racing a user adjustment, for instance); identical notices
//! within a short window are collapsed into one toast.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::Settings;
use crate::ports::{NotificationPort, ToastSink};
use crate::profile::StreamProfile;

const DEFAULT_TITLE: &str = "Audio Offset Manager";
const DEFAULT_DURATION_MS: u64 = 3000;
const DEDUPE_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoticeKind {
    Applied,
    Saved,
}

pub struct DedupingNotifier {
    sink: Arc<dyn ToastSink>,
    settings: Settings,
    last: Mutex<Option<(NoticeKind, String, i64, Instant)>>,
    dedupe_window: Duration,
}

impl DedupingNotifier {
    pub fn new(sink: Arc<dyn ToastSink>, settings: Settings) -> Self {
        Self {
            sink,
            settings,
            last: Mutex::new(None),
            dedupe_window: DEDUPE_WINDOW,
        }
    }

    pub fn with_dedupe_window(mut self, window: Duration) -> Self {
        self.dedupe_window = window;
        self
    }

    fn show(&self, kind: NoticeKind, delay_ms: i64, profile: &StreamProfile) {
        if !self.settings.notifications_enabled() {
            return;
        }
        let setting_id = profile.setting_id();
        {
            let mut last = self.last.lock().unwrap();
            if let Some((k, id, delay, at)) = last.as_ref() {
                if *k == kind
                    && *id == setting_id
                    && *delay == delay_ms
                    && at.elapsed() < self.dedupe_window
                {
                    debug!("duplicate notice for '{setting_id}' suppressed");
                    return;
                }
            }
            *last = Some((kind, setting_id, delay_ms, Instant::now()));
        }
        let verb = match kind {
            NoticeKind::Applied => "applied",
            NoticeKind::Saved => "saved",
        };
        let message = format!("Offset {verb}: {delay_ms:+} ms\n{}", profile.summary(true));
        let mut duration_ms = self.settings.notification_duration_ms();
        if duration_ms == 0 {
            duration_ms = DEFAULT_DURATION_MS;
        }
        self.sink.show(DEFAULT_TITLE, &message, duration_ms);
    }
}

impl NotificationPort for DedupingNotifier {
    fn notify_offset_applied(&self, delay_ms: i64, profile: &StreamProfile) {
        self.show(NoticeKind::Applied, delay_ms, profile);
    }

    fn notify_manual_offset_saved(&self, delay_ms: i64, profile: &StreamProfile) {
        self.show(NoticeKind::Saved, delay_ms, profile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{ConfigPort, PlayerId};
    use crate::profile::{AudioFormat, FpsBucket, HdrType};
    use crate::test_support::{MockConfig, RecordingToasts};
    use std::thread;

    fn profile() -> StreamProfile {
        StreamProfile {
            hdr_type: HdrType::Hdr10,
            fps_bucket: FpsBucket::F23,
            audio_format: AudioFormat::TrueHd,
            audio_channels: Some(8),
            video_fps: Some(23.976),
            player_id: Some(PlayerId(1)),
        }
    }

    fn notifier(config: Arc<MockConfig>, toasts: Arc<RecordingToasts>) -> DedupingNotifier {
        DedupingNotifier::new(toasts, Settings::new(config))
            .with_dedupe_window(Duration::from_millis(50))
    }

    #[test]
    fn formats_applied_message() {
        let config = Arc::new(MockConfig::default());
        config.set_bool("enable_notifications", true);
        config.set_int("notification_seconds", 5);
        let toasts = Arc::new(RecordingToasts::default());
        let n = notifier(config, toasts.clone());

        n.notify_offset_applied(-75, &profile());
        let shown = toasts.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].0, "Audio Offset Manager");
        assert_eq!(shown[0].1, "Offset applied: -75 ms\nHDR10 | 23.98 FPS | TrueHD");
        assert_eq!(shown[0].2, 5000);
    }

    #[test]
    fn positive_delay_carries_a_sign() {
        let config = Arc::new(MockConfig::default());
        config.set_bool("enable_notifications", true);
        let toasts = Arc::new(RecordingToasts::default());
        let n = notifier(config, toasts.clone());

        n.notify_manual_offset_saved(125, &profile());
        assert!(toasts.shown()[0].1.starts_with("Offset saved: +125 ms"));
    }

    #[test]
    fn disabled_notifications_show_nothing() {
        let config = Arc::new(MockConfig::default());
        let toasts = Arc::new(RecordingToasts::default());
        let n = notifier(config, toasts.clone());
        n.notify_offset_applied(-75, &profile());
        assert!(toasts.shown().is_empty());
    }

    #[test]
    fn duplicate_within_window_is_collapsed() {
        let config = Arc::new(MockConfig::default());
        config.set_bool("enable_notifications", true);
        let toasts = Arc::new(RecordingToasts::default());
        let n = notifier(config, toasts.clone());

        n.notify_offset_applied(-75, &profile());
        n.notify_offset_applied(-75, &profile());
        assert_eq!(toasts.shown().len(), 1);

        // Different delay or kind is not a duplicate.
        n.notify_offset_applied(-90, &profile());
        n.notify_manual_offset_saved(-90, &profile());
        assert_eq!(toasts.shown().len(), 3);

        // The same notice again after the window shows normally.
        thread::sleep(Duration::from_millis(60));
        n.notify_manual_offset_saved(-90, &profile());
        assert_eq!(toasts.shown().len(), 4);
    }
}
