use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// x264 speed/quality trade-off points, fastest-to-slowest in the order
/// the encoder itself names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    Medium,
    Slow,
    Slower,
    Veryslow,
    Placebo,
}

impl Preset {
    pub const ALL: [Preset; 10] = [
        Preset::Ultrafast,
        Preset::Superfast,
        Preset::Veryfast,
        Preset::Faster,
        Preset::Fast,
        Preset::Medium,
        Preset::Slow,
        Preset::Slower,
        Preset::Veryslow,
        Preset::Placebo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Ultrafast => "ultrafast",
            Preset::Superfast => "superfast",
            Preset::Veryfast => "veryfast",
            Preset::Faster => "faster",
            Preset::Fast => "fast",
            Preset::Medium => "medium",
            Preset::Slow => "slow",
            Preset::Slower => "slower",
            Preset::Veryslow => "veryslow",
            Preset::Placebo => "placebo",
        }
    }

    /// Reference-frame count worth paying for at this speed point. Faster
    /// presets get fewer frames because x264 won't use more anyway.
    pub fn recommended_ref_frames(&self) -> u32 {
        match self {
            Preset::Ultrafast | Preset::Superfast | Preset::Veryfast => 1,
            Preset::Fast | Preset::Faster | Preset::Medium => 2,
            Preset::Slow | Preset::Slower => 3,
            Preset::Veryslow | Preset::Placebo => 4,
        }
    }
}

impl FromStr for Preset {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failure naming the offending field and its constraint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value for {field}, expected {expected}")]
pub struct ConfigError {
    pub field: &'static str,
    pub expected: &'static str,
}

impl ConfigError {
    fn new(field: &'static str, expected: &'static str) -> Self {
        Self { field, expected }
    }
}

/// Unvalidated option set as submitted by a caller. Unknown keys are
/// ignored during deserialization; every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawEncodeConfig {
    pub audio_bitrate_bps: Option<i64>,
    pub target_size_bits: Option<i64>,
    pub video_fps: Option<i64>,
    pub video_preset: Option<String>,
    pub video_ref_frames: Option<i64>,
    pub video_width: Option<i64>,
    pub video_height: Option<i64>,
    pub worker_count: Option<i64>,
    pub autoplay_on_complete: Option<bool>,
}

/// Fully resolved encode configuration. Immutable once validated; either
/// every present raw field passed its own range check or validation failed
/// as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeConfig {
    pub audio_bitrate_bps: Option<u32>,
    pub target_size_bits: Option<u64>,
    pub video_fps: Option<u32>,
    pub video_preset: Preset,
    pub video_ref_frames: Option<u32>,
    pub video_resolution: Option<(u32, u32)>,
    pub worker_count: Option<u32>,
    pub autoplay_on_complete: bool,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            audio_bitrate_bps: None,
            target_size_bits: None,
            video_fps: None,
            video_preset: Preset::Ultrafast,
            video_ref_frames: Some(1),
            video_resolution: None,
            worker_count: None,
            autoplay_on_complete: false,
        }
    }
}

pub const MAX_AUDIO_BITRATE_BPS: i64 = 320_000;
pub const MAX_REF_FRAMES: i64 = 4;

/// Check an optional integer field against an inclusive range.
///
/// Zero behaves like absent ("unset means default", not "zero is an
/// error"), matching how callers leave fields out entirely.
fn check_range(
    value: Option<i64>,
    min: i64,
    max: i64,
    field: &'static str,
    expected: &'static str,
) -> Result<Option<i64>, ConfigError> {
    match value {
        None | Some(0) => Ok(None),
        Some(v) if v >= min && v <= max => Ok(Some(v)),
        Some(_) => Err(ConfigError::new(field, expected)),
    }
}

/// Validate a raw option set against `defaults`, resolving every field.
///
/// Fields are checked in a fixed order (audio bitrate, target size, fps,
/// preset, ref frames, resolution, worker count, autoplay) and the first
/// violation fails the whole config; nothing is partially applied.
pub fn validate(raw: &RawEncodeConfig, defaults: &EncodeConfig) -> Result<EncodeConfig, ConfigError> {
    let mut config = defaults.clone();

    if let Some(v) = check_range(
        raw.audio_bitrate_bps,
        1,
        MAX_AUDIO_BITRATE_BPS,
        "audio bitrate",
        "1 <= x <= 320000",
    )? {
        config.audio_bitrate_bps = Some(v as u32);
    }

    if let Some(v) = check_range(raw.target_size_bits, 1, i64::MAX, "size target", "1 <= x")? {
        config.target_size_bits = Some(v as u64);
    }

    if let Some(v) = check_range(
        raw.video_fps,
        1,
        i64::from(u32::MAX),
        "video fps",
        "1 <= x <= 4294967295",
    )? {
        config.video_fps = Some(v as u32);
    }

    if let Some(name) = raw.video_preset.as_deref() {
        if !name.is_empty() {
            config.video_preset = name.parse().map_err(|_| {
                ConfigError::new("video preset", "ultrafast | superfast | veryfast | faster | fast | medium | slow | slower | veryslow | placebo")
            })?;
        }
    }

    if let Some(v) = check_range(
        raw.video_ref_frames,
        1,
        MAX_REF_FRAMES,
        "video reference frames",
        "1 <= x <= 4",
    )? {
        config.video_ref_frames = Some(v as u32);
    }

    // Resolution is an all-or-nothing pair; a lone width or height is a
    // validation failure, never silently ignored.
    match (raw.video_width, raw.video_height) {
        (None, None) => {}
        (Some(w), Some(h)) if w >= 1 && h >= 1 => {
            config.video_resolution = Some((w as u32, h as u32));
        }
        _ => {
            return Err(ConfigError::new(
                "video resolution",
                "both width and height present, 1 <= w & 1 <= h",
            ));
        }
    }

    if let Some(v) = check_range(
        raw.worker_count,
        1,
        i64::from(u32::MAX),
        "worker count",
        "1 <= x <= 4294967295",
    )? {
        config.worker_count = Some(v as u32);
    }

    if let Some(autoplay) = raw.autoplay_on_complete {
        config.autoplay_on_complete = autoplay;
    }

    Ok(config)
}

impl EncodeConfig {
    /// Re-express a validated config as a raw option set. Validating the
    /// result against the same defaults yields an identical config.
    pub fn to_raw(&self) -> RawEncodeConfig {
        RawEncodeConfig {
            audio_bitrate_bps: self.audio_bitrate_bps.map(i64::from),
            // Saturate rather than wrap; validation never produces a value
            // this large, but the struct fields are public.
            target_size_bits: self.target_size_bits.map(|v| v.min(i64::MAX as u64) as i64),
            video_fps: self.video_fps.map(i64::from),
            video_preset: Some(self.video_preset.as_str().to_string()),
            video_ref_frames: self.video_ref_frames.map(i64::from),
            video_width: self.video_resolution.map(|(w, _)| i64::from(w)),
            video_height: self.video_resolution.map(|(_, h)| i64::from(h)),
            worker_count: self.worker_count.map(i64::from),
            autoplay_on_complete: Some(self.autoplay_on_complete),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_pass_through() {
        let config = validate(&RawEncodeConfig::default(), &EncodeConfig::default()).unwrap();
        assert_eq!(config, EncodeConfig::default());
        assert_eq!(config.video_preset, Preset::Ultrafast);
        assert_eq!(config.video_ref_frames, Some(1));
        assert!(!config.autoplay_on_complete);
    }

    #[test]
    fn test_audio_bitrate_range() {
        let mut raw = RawEncodeConfig::default();
        raw.audio_bitrate_bps = Some(320_000);
        let config = validate(&raw, &EncodeConfig::default()).unwrap();
        assert_eq!(config.audio_bitrate_bps, Some(320_000));

        raw.audio_bitrate_bps = Some(320_001);
        let err = validate(&raw, &EncodeConfig::default()).unwrap_err();
        assert_eq!(err.field, "audio bitrate");
    }

    #[test]
    fn test_zero_means_unset() {
        let mut raw = RawEncodeConfig::default();
        raw.video_fps = Some(0);
        raw.audio_bitrate_bps = Some(0);
        let config = validate(&raw, &EncodeConfig::default()).unwrap();
        assert_eq!(config.video_fps, None);
        assert_eq!(config.audio_bitrate_bps, None);
    }

    #[test]
    fn test_fail_fast_order() {
        // Two bad fields: the earlier one (audio bitrate) must be reported.
        let mut raw = RawEncodeConfig::default();
        raw.audio_bitrate_bps = Some(-5);
        raw.video_ref_frames = Some(99);
        let err = validate(&raw, &EncodeConfig::default()).unwrap_err();
        assert_eq!(err.field, "audio bitrate");
    }

    #[test]
    fn test_unknown_preset_rejected() {
        let mut raw = RawEncodeConfig::default();
        raw.video_preset = Some("turbo".to_string());
        let err = validate(&raw, &EncodeConfig::default()).unwrap_err();
        assert_eq!(err.field, "video preset");
    }

    #[test]
    fn test_lone_resolution_dimension_fails() {
        let mut raw = RawEncodeConfig::default();
        raw.video_width = Some(640);
        let err = validate(&raw, &EncodeConfig::default()).unwrap_err();
        assert_eq!(err.field, "video resolution");

        let mut raw = RawEncodeConfig::default();
        raw.video_height = Some(480);
        assert!(validate(&raw, &EncodeConfig::default()).is_err());
    }

    #[test]
    fn test_validate_is_idempotent() {
        let mut raw = RawEncodeConfig::default();
        raw.audio_bitrate_bps = Some(128_000);
        raw.video_preset = Some("slow".to_string());
        raw.video_width = Some(1280);
        raw.video_height = Some(720);
        raw.autoplay_on_complete = Some(true);

        let defaults = EncodeConfig::default();
        let first = validate(&raw, &defaults).unwrap();
        let second = validate(&first.to_raw(), &defaults).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_recommended_ref_frames() {
        assert_eq!(Preset::Ultrafast.recommended_ref_frames(), 1);
        assert_eq!(Preset::Veryfast.recommended_ref_frames(), 1);
        assert_eq!(Preset::Faster.recommended_ref_frames(), 2);
        assert_eq!(Preset::Medium.recommended_ref_frames(), 2);
        assert_eq!(Preset::Slower.recommended_ref_frames(), 3);
        assert_eq!(Preset::Placebo.recommended_ref_frames(), 4);
    }

    #[test]
    fn test_fps_and_worker_count_bounded_at_u32() {
        // Values past u32 must be rejected, not truncated into range.
        let mut raw = RawEncodeConfig::default();
        raw.video_fps = Some((1i64 << 32) + 30);
        let err = validate(&raw, &EncodeConfig::default()).unwrap_err();
        assert_eq!(err.field, "video fps");

        let mut raw = RawEncodeConfig::default();
        raw.worker_count = Some(i64::from(u32::MAX) + 1);
        let err = validate(&raw, &EncodeConfig::default()).unwrap_err();
        assert_eq!(err.field, "worker count");

        let mut raw = RawEncodeConfig::default();
        raw.video_fps = Some(i64::from(u32::MAX));
        let config = validate(&raw, &EncodeConfig::default()).unwrap();
        assert_eq!(config.video_fps, Some(u32::MAX));
    }

    #[test]
    fn test_oversized_target_size_saturates_in_raw_form() {
        let mut config = EncodeConfig::default();
        config.target_size_bits = Some(u64::MAX);
        assert_eq!(config.to_raw().target_size_bits, Some(i64::MAX));
    }

    #[test]
    fn test_preset_order_fastest_first() {
        assert_eq!(Preset::ALL.first(), Some(&Preset::Ultrafast));
        assert_eq!(Preset::ALL.last(), Some(&Preset::Placebo));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let raw: RawEncodeConfig =
            serde_json::from_str(r#"{"video_fps": 24, "color_space": "bt709"}"#).unwrap();
        let config = validate(&raw, &EncodeConfig::default()).unwrap();
        assert_eq!(config.video_fps, Some(24));
    }
}
