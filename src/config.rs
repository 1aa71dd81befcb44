//! Typed settings facade
//!
//! Intent-level wrapper over the injected [`ConfigPort`]. All setting keys
//! the core reads or writes are centralized here; callers never format key
//! strings themselves. Missing values fall back to `false`/`0`/`""` except
//! for per-profile offsets, where "not configured" is meaningful and
//! surfaces as `None`.

use std::sync::Arc;

use tracing::debug;

use crate::policy::seek_back::SeekKind;
use crate::ports::ConfigPort;
use crate::profile::{HdrType, StreamProfile};

/// Setting keys shared between the core and the host settings UI.
pub mod keys {
    pub const NEW_INSTALL: &str = "new_install";
    pub const ENABLE_ACTIVE_MONITORING: &str = "enable_active_monitoring";
    pub const ENABLE_DEBUG_LOGGING: &str = "enable_debug_logging";
    pub const ENABLE_NOTIFICATIONS: &str = "enable_notifications";
    pub const NOTIFICATION_SECONDS: &str = "notification_seconds";
    /// Whether the platform's detailed HDR probe works (capability flag,
    /// persisted by the resolver for the settings UI).
    pub const PLATFORM_HDR_FULL: &str = "platform_hdr_full";
    /// Whether the EOTF/gamut probe is available on this platform.
    pub const ADVANCED_HLG: &str = "advanced_hlg";
}

/// Cloneable typed view over the host's settings store.
#[derive(Clone)]
pub struct Settings {
    port: Arc<dyn ConfigPort>,
}

impl Settings {
    pub fn new(port: Arc<dyn ConfigPort>) -> Self {
        Self { port }
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.port.get_bool(key).unwrap_or(false)
    }

    pub fn get_int(&self, key: &str) -> i64 {
        self.port.get_int(key).unwrap_or(0)
    }

    pub fn get_string(&self, key: &str) -> String {
        self.port.get_string(key).unwrap_or_default()
    }

    /// Whether offsets may be applied at all for this dynamic-range type.
    pub fn hdr_enabled(&self, hdr: HdrType) -> bool {
        self.get_bool(&format!("enable_{}", hdr.key()))
    }

    /// Whether the user asked for per-frame-rate tuning for this HDR type.
    /// When off, all frame rates share one `all` bucket.
    pub fn fps_override_enabled(&self, hdr: HdrType) -> bool {
        self.get_bool(&format!("enable_fps_{}", hdr.key()))
    }

    /// Configured delay for the profile, or `None` when nothing has been
    /// stored under its setting id.
    pub fn offset_ms(&self, profile: &StreamProfile) -> Option<i64> {
        self.port.get_int(&profile.setting_id())
    }

    pub fn set_offset_ms(&self, setting_id: &str, delay_ms: i64) {
        debug!("storing offset {delay_ms}ms under '{setting_id}'");
        self.port.set_int(setting_id, delay_ms);
    }

    /// `(enabled, seconds)` for a seek-back trigger kind. Seconds are
    /// clamped to zero from below; the policy treats zero as disabled.
    pub fn seek_back_config(&self, kind: SeekKind) -> (bool, u32) {
        let enabled = self.get_bool(&format!("enable_seek_back_{}", kind.key()));
        let seconds = self.get_int(&format!("seek_back_{}_seconds", kind.key()));
        (enabled, seconds.max(0) as u32)
    }

    pub fn active_monitoring_enabled(&self) -> bool {
        self.get_bool(keys::ENABLE_ACTIVE_MONITORING)
    }

    pub fn notifications_enabled(&self) -> bool {
        self.get_bool(keys::ENABLE_NOTIFICATIONS)
    }

    pub fn notification_duration_ms(&self) -> u64 {
        (self.get_int(keys::NOTIFICATION_SECONDS).max(0) as u64) * 1000
    }

    pub fn debug_logging_enabled(&self) -> bool {
        self.get_bool(keys::ENABLE_DEBUG_LOGGING)
    }

    pub fn new_install(&self) -> bool {
        self.get_bool(keys::NEW_INSTALL)
    }

    /// Write only when the stored value differs, to spare the settings
    /// backend redundant churn on every playback.
    pub fn store_bool_if_changed(&self, key: &str, value: bool) {
        if self.port.get_bool(key) != Some(value) {
            debug!("storing '{key}' = {value}");
            self.port.set_bool(key, value);
        }
    }
}
