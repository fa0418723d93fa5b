/// Property-based tests for config validation and command compilation.
use progenc::engine::{
    build_encode_args, validate, video_bitrate_bps, EncodeConfig, Preset, RawEncodeConfig,
    MAX_AUDIO_BITRATE_BPS, MAX_REF_FRAMES,
};
use proptest::prelude::*;

fn preset_name() -> impl Strategy<Value = String> {
    prop::sample::select(Preset::ALL.to_vec()).prop_map(|p| p.as_str().to_string())
}

fn valid_raw() -> impl Strategy<Value = RawEncodeConfig> {
    (
        prop::option::of(0..=MAX_AUDIO_BITRATE_BPS),
        prop::option::of(0i64..=1_000_000_000_000),
        prop::option::of(0i64..=240),
        prop::option::of(preset_name()),
        prop::option::of(0..=MAX_REF_FRAMES),
        prop::option::of((1i64..=7680, 1i64..=4320)),
        prop::option::of(0i64..=64),
        prop::option::of(any::<bool>()),
    )
        .prop_map(
            |(audio, size, fps, preset, refs, resolution, workers, autoplay)| RawEncodeConfig {
                audio_bitrate_bps: audio,
                target_size_bits: size,
                video_fps: fps,
                video_preset: preset,
                video_ref_frames: refs,
                video_width: resolution.map(|(w, _)| w),
                video_height: resolution.map(|(_, h)| h),
                worker_count: workers,
                autoplay_on_complete: autoplay,
            },
        )
}

proptest! {
    #[test]
    fn valid_configs_always_validate(raw in valid_raw()) {
        let config = validate(&raw, &EncodeConfig::default()).unwrap();

        if let Some(v) = config.audio_bitrate_bps {
            prop_assert!((1..=MAX_AUDIO_BITRATE_BPS as u32).contains(&v));
        }
        if let Some(v) = config.video_ref_frames {
            prop_assert!((1..=MAX_REF_FRAMES as u32).contains(&v));
        }
        if let Some((w, h)) = config.video_resolution {
            prop_assert!(w >= 1 && h >= 1);
        }
    }

    #[test]
    fn validation_is_idempotent(raw in valid_raw()) {
        let defaults = EncodeConfig::default();
        let first = validate(&raw, &defaults).unwrap();
        let second = validate(&first.to_raw(), &defaults).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn zero_fields_resolve_to_defaults(mut raw in valid_raw()) {
        raw.audio_bitrate_bps = Some(0);
        raw.video_fps = Some(0);
        raw.video_ref_frames = Some(0);
        let config = validate(&raw, &EncodeConfig::default()).unwrap();
        prop_assert_eq!(config.audio_bitrate_bps, None);
        prop_assert_eq!(config.video_fps, None);
        // Zero falls back to the default, which carries ref frames.
        prop_assert_eq!(config.video_ref_frames, EncodeConfig::default().video_ref_frames);
    }

    #[test]
    fn out_of_range_audio_bitrate_rejected(v in (MAX_AUDIO_BITRATE_BPS + 1)..i64::MAX) {
        let mut raw = RawEncodeConfig::default();
        raw.audio_bitrate_bps = Some(v);
        let err = validate(&raw, &EncodeConfig::default()).unwrap_err();
        prop_assert_eq!(err.field, "audio bitrate");
    }

    #[test]
    fn fps_beyond_u32_rejected(v in (i64::from(u32::MAX) + 1)..i64::MAX) {
        let mut raw = RawEncodeConfig::default();
        raw.video_fps = Some(v);
        let err = validate(&raw, &EncodeConfig::default()).unwrap_err();
        prop_assert_eq!(err.field, "video fps");
    }

    #[test]
    fn negative_sizes_rejected(v in i64::MIN..0) {
        let mut raw = RawEncodeConfig::default();
        raw.target_size_bits = Some(v);
        let err = validate(&raw, &EncodeConfig::default()).unwrap_err();
        prop_assert_eq!(err.field, "size target");
    }

    #[test]
    fn lone_resolution_dimension_always_rejected(w in 1i64..=7680) {
        let mut raw = RawEncodeConfig::default();
        raw.video_width = Some(w);
        let err = validate(&raw, &EncodeConfig::default()).unwrap_err();
        prop_assert_eq!(err.field, "video resolution");
    }

    #[test]
    fn compiled_command_is_deterministic(raw in valid_raw(), duration in 0.1f64..86_400.0) {
        let config = validate(&raw, &EncodeConfig::default()).unwrap();
        let a = build_encode_args("in.mp4", &config, duration);
        let b = build_encode_args("in.mp4", &config, duration);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn video_bitrate_never_exceeds_size_budget(
        target in 1u64..=1_000_000_000_000,
        duration in 0.1f64..86_400.0,
        audio in prop::option::of(1u32..=MAX_AUDIO_BITRATE_BPS as u32),
    ) {
        let video = video_bitrate_bps(target, duration, audio);
        let audio_total = f64::from(audio.unwrap_or(0)) * duration;
        prop_assert!(video as f64 * duration + audio_total <= target as f64 + duration);
    }
}
