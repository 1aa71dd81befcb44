//! Host-facing port traits
//!
//! The core never talks to a media player directly; everything it needs from
//! the host arrives through these traits. Implementations wrap whatever
//! control protocol the host speaks and surface failures as `None`/`false`
//! instead of raising, so the decision engine can branch on results.

use serde::{Deserialize, Serialize};

use crate::profile::StreamProfile;

/// Identifier of an active player session on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw audio stream description as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioStream {
    /// Codec name as the host reports it (may carry vendor prefixes or be
    /// `"none"` while the stream is still settling).
    pub codec: String,
    pub channels: Option<u32>,
}

/// Player control operations. A single fetch may legitimately return nothing
/// while the host is still settling; callers apply their own retry policy.
pub trait PlayerControlPort: Send + Sync {
    fn get_active_player(&self) -> Option<PlayerId>;
    fn get_audio_stream(&self, player: PlayerId) -> Option<AudioStream>;
    /// Returns `false` on RPC-level failure. Never panics.
    fn set_audio_delay(&self, player: PlayerId, seconds: f64) -> bool;
    /// Seek backward by `seconds`. Returns `false` on RPC-level failure.
    fn seek_backward(&self, player: PlayerId, seconds: u32) -> bool;
}

/// Typed access to the host's video stream probes. `None` means the source
/// is unavailable or unusable on this platform.
pub trait VideoInfoPort: Send + Sync {
    fn video_fps(&self) -> Option<f64>;
    /// Detailed dynamic-range probe (e.g. distinguishes HDR10+ from HDR10).
    fn hdr_type_detailed(&self) -> Option<String>;
    /// Generic fallback probe, consulted when the detailed one is unusable.
    fn hdr_type_fallback(&self) -> Option<String>;
    /// EOTF/gamut probe, used to catch HLG streams the other probes miss.
    fn gamut_info(&self) -> Option<String>;
}

/// Polled view of the host's dialog stack, for the active monitor.
pub trait DialogPort: Send + Sync {
    /// Identifier of the top-level dialog currently open, if any.
    fn current_dialog_id(&self) -> Option<u32>;
    /// Displayed audio delay in the host's text form (e.g. `"-0.075 s"`).
    fn audio_delay_text(&self) -> Option<String>;
}

/// Named-setting storage. `None` from a getter means the key has no stored
/// value; the [`Settings`](crate::config::Settings) facade decides defaults.
pub trait ConfigPort: Send + Sync {
    fn get_bool(&self, key: &str) -> Option<bool>;
    fn get_int(&self, key: &str) -> Option<i64>;
    fn get_string(&self, key: &str) -> Option<String>;
    fn set_bool(&self, key: &str, value: bool);
    fn set_int(&self, key: &str, value: i64);
    fn set_string(&self, key: &str, value: &str);
}

/// Outbound user notifications about offset activity.
pub trait NotificationPort: Send + Sync {
    /// An offset was applied automatically for the given profile.
    fn notify_offset_applied(&self, delay_ms: i64, profile: &StreamProfile);
    /// A manual adjustment was detected and persisted for the given profile.
    fn notify_manual_offset_saved(&self, delay_ms: i64, profile: &StreamProfile);
}

/// Raw toast display, implemented by the host. Deduplication lives in
/// [`DedupingNotifier`](crate::notify::DedupingNotifier).
pub trait ToastSink: Send + Sync {
    fn show(&self, title: &str, message: &str, duration_ms: u64);
}
