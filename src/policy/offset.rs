//! Offset application policy
//!
//! Subscribes to the normalized playback events and decides when to push a
//! configured audio delay to the player. The policy itself is a guard chain
//! over the freshly resolved profile; its only memory is the last
//! `(setting_id, delay)` actually issued, which makes repeated identical
//! events idempotent. It also governs the [`ActiveMonitor`] lifecycle, since
//! the conditions for monitoring are profile-dependent.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::events::{EventBus, EventName, HandlerId};
use crate::monitor::{ActiveMonitor, MonitorTimings};
use crate::ports::{DialogPort, NotificationPort, PlayerControlPort};
use crate::profile::StreamProfile;
use crate::resolver::StreamProfileResolver;
use crate::shutdown::Shutdown;

struct OffsetInner {
    control: Arc<dyn PlayerControlPort>,
    dialogs: Arc<dyn DialogPort>,
    resolver: Arc<StreamProfileResolver>,
    settings: Settings,
    notifications: Arc<dyn NotificationPort>,
    bus: Arc<EventBus>,
    shutdown: Shutdown,
    monitor_timings: MonitorTimings,
    last_applied: Mutex<Option<(String, i64)>>,
    monitor: Mutex<Option<ActiveMonitor>>,
}

impl OffsetInner {
    /// Run on AV start and on every verified AV change.
    fn manage(&self) {
        self.apply_offset();
        self.log_snapshot();
    }

    /// Guard chain deciding whether to push the configured delay.
    fn apply_offset(&self) {
        // Read the flag before resolving: the resolver clears it once
        // capabilities are known, and the deferral must cover the playback
        // that made them known.
        let defer_new_install = self.settings.new_install();
        let profile = self.resolver.resolve();
        // The monitor is governed by profile conditions alone; it arms
        // even while application is deferred or no delay is configured.
        self.sync_monitor(&profile);
        if defer_new_install {
            debug!("new install, deferring offset application");
            return;
        }
        if profile.has_unknown() {
            debug!("profile {profile} has unresolved fields, skipping");
            return;
        }
        if !self.settings.hdr_enabled(profile.hdr_type) {
            debug!("{} offsets disabled by configuration", profile.hdr_type);
            return;
        }
        let setting_id = profile.setting_id();
        let Some(delay_ms) = self.settings.offset_ms(&profile) else {
            debug!("no delay configured for '{setting_id}'");
            return;
        };
        if *self.last_applied.lock().unwrap() == Some((setting_id.clone(), delay_ms)) {
            debug!("delay {delay_ms}ms already applied for '{setting_id}'");
            return;
        }
        let Some(player_id) = profile.player_id else {
            debug!("no active player, cannot apply delay");
            return;
        };
        info!("applying {delay_ms}ms for '{setting_id}'");
        let applied = self
            .control
            .set_audio_delay(player_id, delay_ms as f64 / 1000.0);
        // Remembered even on failure so a flapping RPC is not hammered on
        // every repeated event; the memo clears on the next stop.
        *self.last_applied.lock().unwrap() = Some((setting_id.clone(), delay_ms));
        if applied {
            self.notifications.notify_offset_applied(delay_ms, &profile);
        } else {
            warn!("set_audio_delay failed for '{setting_id}'");
        }
    }

    /// Start or stop the dialog monitor so it runs exactly while its
    /// governing conditions hold for the current profile.
    fn sync_monitor(&self, profile: &StreamProfile) {
        let should_run = self.settings.active_monitoring_enabled()
            && !profile.has_unknown()
            && self.settings.hdr_enabled(profile.hdr_type);
        let previous = {
            let mut monitor = self.monitor.lock().unwrap();
            match monitor.as_ref() {
                Some(running) if should_run && running.profile() == profile => return,
                _ => monitor.take(),
            }
        };
        // Joining under the lock would deadlock against the monitor's own
        // USER_ADJUSTMENT handler, which also takes it.
        if let Some(previous) = previous {
            previous.stop();
        }
        if !should_run {
            return;
        }
        let started = ActiveMonitor::start(
            self.dialogs.clone(),
            self.settings.clone(),
            self.bus.clone(),
            profile.clone(),
            self.shutdown.clone(),
            self.monitor_timings,
        );
        match started {
            Ok(monitor) => *self.monitor.lock().unwrap() = Some(monitor),
            Err(e) => warn!("could not start active monitor: {e}"),
        }
    }

    fn stop_monitor(&self) {
        let running = self.monitor.lock().unwrap().take();
        if let Some(running) = running {
            running.stop();
        }
    }

    fn on_playback_over(&self) {
        *self.last_applied.lock().unwrap() = None;
        self.resolver.clear();
        self.stop_monitor();
    }

    /// The monitor persisted a manual change; read it back for the current
    /// profile and hand it to the notification collaborator.
    fn on_user_adjustment(&self) {
        if self.monitor.lock().unwrap().is_none() {
            return;
        }
        let Some(profile) = self.resolver.current() else {
            return;
        };
        let delay_ms = self.settings.offset_ms(&profile).unwrap_or(0);
        self.notifications
            .notify_manual_offset_saved(delay_ms, &profile);
        self.log_snapshot();
    }

    fn log_snapshot(&self) {
        if !self.settings.debug_logging_enabled() {
            return;
        }
        let last_applied = self.last_applied.lock().unwrap().clone();
        let monitoring = self.monitor.lock().unwrap().is_some();
        debug!("offset policy: last_applied={last_applied:?} monitoring={monitoring}");
    }
}

/// Event-driven offset decisions. Create, then [`start`](Self::start) to
/// subscribe its handlers.
pub struct OffsetPolicyEngine {
    inner: Arc<OffsetInner>,
    subscriptions: Vec<(EventName, HandlerId)>,
}

impl OffsetPolicyEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bus: Arc<EventBus>,
        control: Arc<dyn PlayerControlPort>,
        dialogs: Arc<dyn DialogPort>,
        resolver: Arc<StreamProfileResolver>,
        settings: Settings,
        notifications: Arc<dyn NotificationPort>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            inner: Arc::new(OffsetInner {
                control,
                dialogs,
                resolver,
                settings,
                notifications,
                bus,
                shutdown,
                monitor_timings: MonitorTimings::default(),
                last_applied: Mutex::new(None),
                monitor: Mutex::new(None),
            }),
            subscriptions: Vec::new(),
        }
    }

    /// No effect after `start`; the subscriptions hold their own handles
    /// to the engine state.
    pub fn with_monitor_timings(mut self, timings: MonitorTimings) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.monitor_timings = timings,
            None => warn!("monitor timings ignored, engine already started"),
        }
        self
    }

    pub fn start(&mut self) {
        if !self.subscriptions.is_empty() {
            return;
        }
        let subs: [(EventName, fn(&OffsetInner)); 5] = [
            (EventName::AvStarted, OffsetInner::manage),
            (EventName::AvChange, OffsetInner::manage),
            (EventName::PlaybackStopped, OffsetInner::on_playback_over),
            (EventName::PlaybackEnded, OffsetInner::on_playback_over),
            (EventName::UserAdjustment, OffsetInner::on_user_adjustment),
        ];
        for (name, handler) in subs {
            let inner = self.inner.clone();
            let id = self.inner.bus.subscribe_fn(name, move |_| handler(&inner));
            self.subscriptions.push((name, id));
        }
    }

    /// Unsubscribe and quiesce. Any running monitor is joined.
    pub fn stop(&mut self) {
        for (name, id) in self.subscriptions.drain(..) {
            self.inner.bus.unsubscribe(name, id);
        }
        self.inner.stop_monitor();
        *self.inner.last_applied.lock().unwrap() = None;
    }

    pub fn is_monitoring(&self) -> bool {
        self.inner.monitor.lock().unwrap().is_some()
    }
}
