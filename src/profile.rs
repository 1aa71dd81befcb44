//! Stream profile types
//!
//! A [`StreamProfile`] is an immutable snapshot of the characteristics that
//! drive offset selection: dynamic-range type, frame-rate bucket and audio
//! format. It derives the deterministic `setting_id` under which a delay is
//! stored, and a human-readable summary for notifications.

use serde::{Deserialize, Serialize};

use crate::ports::PlayerId;

/// Dynamic-range classification of the current video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HdrType {
    DolbyVision,
    Hdr10,
    Hdr10Plus,
    Hlg,
    Sdr,
    Unknown,
}

impl HdrType {
    /// Canonical lowercase key used in setting ids and config keys.
    pub fn key(&self) -> &'static str {
        match self {
            HdrType::DolbyVision => "dolbyvision",
            HdrType::Hdr10 => "hdr10",
            HdrType::Hdr10Plus => "hdr10plus",
            HdrType::Hlg => "hlg",
            HdrType::Sdr => "sdr",
            HdrType::Unknown => "unknown",
        }
    }

    pub fn from_key(key: &str) -> Self {
        match key {
            "dolbyvision" => HdrType::DolbyVision,
            "hdr10" => HdrType::Hdr10,
            "hdr10plus" => HdrType::Hdr10Plus,
            "hlg" => HdrType::Hlg,
            "sdr" => HdrType::Sdr,
            _ => HdrType::Unknown,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            HdrType::DolbyVision => "DV",
            HdrType::Hdr10 => "HDR10",
            HdrType::Hdr10Plus => "HDR10+",
            HdrType::Hlg => "HLG",
            HdrType::Sdr => "SDR",
            HdrType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for HdrType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Canonical audio codec classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioFormat {
    #[serde(rename = "truehd")]
    TrueHd,
    #[serde(rename = "eac3")]
    Eac3,
    #[serde(rename = "ac3")]
    Ac3,
    #[serde(rename = "dtshd_ma")]
    DtsHdMa,
    #[serde(rename = "dtshd_hra")]
    DtsHdHra,
    #[serde(rename = "dca")]
    Dts,
    #[serde(rename = "pcm")]
    Pcm,
    #[serde(rename = "unknown")]
    Unknown,
}

impl AudioFormat {
    /// Classification order matters: `eac3` must be probed before `ac3`
    /// because the former contains the latter as a substring.
    pub const CANONICAL: [AudioFormat; 7] = [
        AudioFormat::TrueHd,
        AudioFormat::Eac3,
        AudioFormat::Ac3,
        AudioFormat::DtsHdMa,
        AudioFormat::DtsHdHra,
        AudioFormat::Dts,
        AudioFormat::Pcm,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            AudioFormat::TrueHd => "truehd",
            AudioFormat::Eac3 => "eac3",
            AudioFormat::Ac3 => "ac3",
            AudioFormat::DtsHdMa => "dtshd_ma",
            AudioFormat::DtsHdHra => "dtshd_hra",
            AudioFormat::Dts => "dca",
            AudioFormat::Pcm => "pcm",
            AudioFormat::Unknown => "unknown",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AudioFormat::TrueHd => "TrueHD",
            AudioFormat::Eac3 => "DD+",
            AudioFormat::Ac3 => "DD",
            AudioFormat::DtsHdMa => "DTS-HD MA",
            AudioFormat::DtsHdHra => "DTS-HD HRA",
            AudioFormat::Dts => "DTS",
            AudioFormat::Pcm => "PCM",
            AudioFormat::Unknown => "Unknown Format",
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Nominal frame-rate bucket, or `All` when per-fps tuning is disabled for
/// the stream's HDR type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FpsBucket {
    #[serde(rename = "23")]
    F23,
    #[serde(rename = "24")]
    F24,
    #[serde(rename = "25")]
    F25,
    #[serde(rename = "29")]
    F29,
    #[serde(rename = "30")]
    F30,
    #[serde(rename = "50")]
    F50,
    #[serde(rename = "59")]
    F59,
    #[serde(rename = "60")]
    F60,
    #[serde(rename = "all")]
    All,
    #[serde(rename = "unknown")]
    Unknown,
}

impl FpsBucket {
    /// Bucket a measured frame rate; only the nominal set is accepted.
    pub fn from_fps(fps: f64) -> Self {
        match fps.trunc() as i64 {
            23 => FpsBucket::F23,
            24 => FpsBucket::F24,
            25 => FpsBucket::F25,
            29 => FpsBucket::F29,
            30 => FpsBucket::F30,
            50 => FpsBucket::F50,
            59 => FpsBucket::F59,
            60 => FpsBucket::F60,
            _ => FpsBucket::Unknown,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            FpsBucket::F23 => "23",
            FpsBucket::F24 => "24",
            FpsBucket::F25 => "25",
            FpsBucket::F29 => "29",
            FpsBucket::F30 => "30",
            FpsBucket::F50 => "50",
            FpsBucket::F59 => "59",
            FpsBucket::F60 => "60",
            FpsBucket::All => "all",
            FpsBucket::Unknown => "unknown",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FpsBucket::F23 => "23.98",
            FpsBucket::F24 => "24.00",
            FpsBucket::F25 => "25.00",
            FpsBucket::F29 => "29.97",
            FpsBucket::F30 => "30.00",
            FpsBucket::F50 => "50.00",
            FpsBucket::F59 => "59.94",
            FpsBucket::F60 => "60.00",
            FpsBucket::All => "all",
            FpsBucket::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FpsBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Immutable stream characteristics used for settings lookups and display.
///
/// Created fresh on every resolution and superseded wholesale on each AV
/// event; never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamProfile {
    pub hdr_type: HdrType,
    pub fps_bucket: FpsBucket,
    pub audio_format: AudioFormat,
    pub audio_channels: Option<u32>,
    /// Raw measured frame rate, kept for display and snapshots.
    pub video_fps: Option<f64>,
    pub player_id: Option<PlayerId>,
}

impl StreamProfile {
    /// Deterministic key for the settings grid: `<hdr>_<fps>_<audio>`.
    pub fn setting_id(&self) -> String {
        format!(
            "{}_{}_{}",
            self.hdr_type.key(),
            self.fps_bucket.key(),
            self.audio_format.key()
        )
    }

    /// True when any field that keys an offset lookup is unresolved.
    pub fn has_unknown(&self) -> bool {
        self.hdr_type == HdrType::Unknown
            || self.audio_format == AudioFormat::Unknown
            || self.fps_bucket == FpsBucket::Unknown
    }

    /// Human-readable form, e.g. `HDR10 | 23.98 FPS | TrueHD`. The fps part
    /// is omitted when buckets are collapsed to `all`.
    pub fn summary(&self, include_fps: bool) -> String {
        let hdr = self.hdr_type.display_name();
        let audio = self.audio_format.display_name();
        if include_fps && self.fps_bucket != FpsBucket::All {
            format!("{hdr} | {} FPS | {audio}", self.fps_bucket.display_name())
        } else {
            format!("{hdr} | {audio}")
        }
    }
}

impl std::fmt::Display for StreamProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.setting_id())
    }
}
