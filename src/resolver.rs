//! Stream profile resolution
//!
//! Derives an immutable [`StreamProfile`] from the host's current player
//! state. The host reports everything lazily and noisily: the player id and
//! codec may be absent for a second or two after a playback event, the
//! detailed HDR probe only works on some platforms, and some HLG streams
//! only reveal themselves through the EOTF/gamut probe. Resolution applies
//! one bounded retry discipline to the flaky fetches and a fallback chain to
//! the HDR probes, then classifies everything into the canonical enums.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::config::{keys, Settings};
use crate::ports::{PlayerControlPort, PlayerId, VideoInfoPort};
use crate::profile::{AudioFormat, FpsBucket, HdrType, StreamProfile};
use crate::retry::RetryPolicy;
use crate::shutdown::Shutdown;

/// Resolves and caches the profile of the currently playing stream.
pub struct StreamProfileResolver {
    control: Arc<dyn PlayerControlPort>,
    video: Arc<dyn VideoInfoPort>,
    settings: Settings,
    shutdown: Shutdown,
    retry: RetryPolicy,
    current: Mutex<Option<StreamProfile>>,
    /// Set from config at startup; cleared after the first resolution so the
    /// offset policy stops deferring once platform capabilities are known.
    new_install: AtomicBool,
}

impl StreamProfileResolver {
    pub fn new(
        control: Arc<dyn PlayerControlPort>,
        video: Arc<dyn VideoInfoPort>,
        settings: Settings,
        shutdown: Shutdown,
    ) -> Self {
        let new_install = settings.new_install();
        Self {
            control,
            video,
            settings,
            shutdown,
            retry: RetryPolicy::default(),
            current: Mutex::new(None),
            new_install: AtomicBool::new(new_install),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Last resolved profile, if playback is active.
    pub fn current(&self) -> Option<StreamProfile> {
        self.current.lock().unwrap().clone()
    }

    /// Forget the cached profile (playback stopped).
    pub fn clear(&self) {
        *self.current.lock().unwrap() = None;
        debug!("cleared cached stream profile");
    }

    /// Gather a fresh profile from the host. Always succeeds; fields the
    /// host cannot answer for resolve to `Unknown`/`None`.
    pub fn resolve(&self) -> StreamProfile {
        let player_id = self.fetch_player_id();

        let (audio_format, audio_channels) = match player_id {
            None => {
                debug!("no active player, skipping audio stream fetch");
                (AudioFormat::Unknown, None)
            }
            Some(pid) => self.fetch_audio(pid),
        };

        let (video_fps, mut fps_bucket) = self.fetch_fps();
        let (mut hdr_type, platform_hdr_full, gamut) = self.fetch_hdr();

        if hdr_type == HdrType::Sdr {
            if let Some(gamut) = &gamut {
                if gamut.to_lowercase().contains("hlg") {
                    debug!("reclassifying sdr as hlg via gamut probe '{gamut}'");
                    hdr_type = HdrType::Hlg;
                }
            }
        }

        // Capability flags observed during resolution, persisted for the
        // settings UI. Store-if-changed keeps this a one-time write.
        self.settings
            .store_bool_if_changed(keys::PLATFORM_HDR_FULL, platform_hdr_full);
        self.settings
            .store_bool_if_changed(keys::ADVANCED_HLG, gamut.is_some());
        if self.new_install.swap(false, Ordering::SeqCst) {
            self.settings.store_bool_if_changed(keys::NEW_INSTALL, false);
            debug!("first resolution complete, cleared new-install flag");
        }

        if hdr_type != HdrType::Unknown && !self.settings.fps_override_enabled(hdr_type) {
            fps_bucket = FpsBucket::All;
        }

        let profile = StreamProfile {
            hdr_type,
            fps_bucket,
            audio_format,
            audio_channels,
            video_fps,
            player_id,
        };
        debug!("resolved stream profile {profile}");
        *self.current.lock().unwrap() = Some(profile.clone());
        profile
    }

    /// Classified codec of the current audio stream, or `None` while the
    /// host has not settled on one. Used by the AV-change debouncer.
    pub fn current_audio_codec(&self) -> Option<AudioFormat> {
        let player_id = self.fetch_player_id()?;
        match self.fetch_audio(player_id).0 {
            AudioFormat::Unknown => None,
            codec => Some(codec),
        }
    }

    fn fetch_player_id(&self) -> Option<PlayerId> {
        self.retry
            .run(&self.shutdown, "active player", || {
                self.control.get_active_player()
            })
    }

    fn fetch_audio(&self, player_id: PlayerId) -> (AudioFormat, Option<u32>) {
        let stream = self.retry.run(&self.shutdown, "audio stream", || {
            self.control
                .get_audio_stream(player_id)
                .filter(|stream| stream.codec != "none")
        });
        match stream {
            None => (AudioFormat::Unknown, None),
            Some(stream) => (classify_codec(&stream.codec), stream.channels),
        }
    }

    fn fetch_fps(&self) -> (Option<f64>, FpsBucket) {
        match self.video.video_fps() {
            None => {
                debug!("frame rate not reported");
                (None, FpsBucket::Unknown)
            }
            Some(fps) => {
                let bucket = FpsBucket::from_fps(fps);
                if bucket == FpsBucket::Unknown {
                    debug!("non-standard frame rate {fps}");
                }
                (Some(fps), bucket)
            }
        }
    }

    /// HDR fallback chain: detailed probe first, generic probe second. The
    /// gamut probe result is returned for the HLG heuristic and as a
    /// capability observation.
    fn fetch_hdr(&self) -> (HdrType, bool, Option<String>) {
        let detailed = self
            .video
            .hdr_type_detailed()
            .filter(|value| !value.trim().is_empty());
        let platform_hdr_full = detailed.is_some();
        let raw = match detailed {
            Some(value) => Some(value),
            None => {
                debug!("detailed HDR probe unusable, using fallback probe");
                self.video.hdr_type_fallback()
            }
        };
        let hdr_type = normalize_hdr(raw.as_deref());
        let gamut = self
            .video
            .gamut_info()
            .filter(|value| !value.trim().is_empty());
        (hdr_type, platform_hdr_full, gamut)
    }
}

/// Classify a host-reported codec string into the canonical set.
///
/// The vendor passthrough prefix is stripped, then the canonical keys are
/// probed as substrings. Anything unmatched that is still a real value is
/// assumed to be PCM (the host decodes unsupported bitstreams to PCM).
pub(crate) fn classify_codec(raw: &str) -> AudioFormat {
    let cleaned = raw.trim().to_ascii_lowercase().replace("pt-", "");
    for format in AudioFormat::CANONICAL {
        if cleaned.contains(format.key()) {
            return format;
        }
    }
    match cleaned.as_str() {
        "" | "unknown" | "none" => AudioFormat::Unknown,
        _ => AudioFormat::Pcm,
    }
}

/// Normalize a raw HDR string: fold `+` and spaces, lowercase, map the
/// host's `hlg hdr` alias, treat empty as SDR, anything unrecognized as
/// Unknown.
pub(crate) fn normalize_hdr(raw: Option<&str>) -> HdrType {
    let Some(raw) = raw else {
        return HdrType::Sdr;
    };
    let cleaned = raw.replace('+', "plus").replace(' ', "").to_lowercase();
    if cleaned.is_empty() {
        return HdrType::Sdr;
    }
    if cleaned == "hlghdr" {
        return HdrType::Hlg;
    }
    HdrType::from_key(&cleaned)
}
