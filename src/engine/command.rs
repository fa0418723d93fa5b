use super::encode_config::EncodeConfig;

/// Fixed name the engine writes the encoded result under inside its
/// virtual filesystem.
pub const OUTPUT_NAME: &str = "output.mp4";

/// Video bitrate in bits/s for a total-size budget: the whole bit budget
/// spread over the duration, minus what the audio stream will take.
///
/// A missing audio bitrate counts as 0, never as a hole in the arithmetic.
pub fn video_bitrate_bps(target_size_bits: u64, duration_s: f64, audio_bitrate_bps: Option<u32>) -> i64 {
    let audio = f64::from(audio_bitrate_bps.unwrap_or(0));
    (target_size_bits as f64 / duration_s - audio).floor() as i64
}

/// Compile a validated config into the ordered engine argument list.
///
/// The base clause is always emitted; optional clauses follow in a fixed
/// order (target bitrate, ref frames, scale, fps cap, audio bitrate) so the
/// same `(input, config, duration)` always compiles to a byte-identical
/// list.
pub fn build_encode_args(input: &str, config: &EncodeConfig, duration_s: f64) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-v".into(),
        "info".into(),
        "-i".into(),
        input.into(),
        "-preset".into(),
        config.video_preset.as_str().into(),
        "-movflags".into(),
        "+faststart".into(),
        "-tag:v".into(),
        "avc1".into(),
        "-map".into(),
        "0:v:0".into(),
        "-c:v".into(),
        "libx264".into(),
        "-fps_mode".into(),
        "vfr".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-tag:a".into(),
        "mp4a".into(),
        "-map".into(),
        "0:a:0".into(),
        "-c:a".into(),
        "aac".into(),
    ];

    if let Some(target) = config.target_size_bits {
        args.push("-b:v".into());
        args.push(video_bitrate_bps(target, duration_s, config.audio_bitrate_bps).to_string());
    }

    if let Some(refs) = config.video_ref_frames {
        args.push("-x264-params".into());
        args.push(format!("ref={refs}"));
    }

    if let Some((w, h)) = config.video_resolution {
        args.push("-vf".into());
        // Downscale only: never exceed the source dimensions, keep aspect.
        args.push(format!(
            "scale='min({w},iw)':'min({h},ih)':force_original_aspect_ratio=decrease"
        ));
    }

    if let Some(fps) = config.video_fps {
        args.push("-fpsmax".into());
        args.push(fps.to_string());
    }

    if let Some(bps) = config.audio_bitrate_bps {
        args.push("-b:a".into());
        args.push(bps.to_string());
    }

    args.push(OUTPUT_NAME.into());
    args
}

/// Argument list for the duration probe. The result comes back as a bare
/// numeric log line, not a return value.
pub fn build_probe_args(input: &str) -> Vec<String> {
    vec![
        "-v".into(),
        "quiet".into(),
        "-show_entries".into(),
        "format=duration".into(),
        "-of".into(),
        "default=noprint_wrappers=1:nokey=1".into(),
        input.into(),
    ]
}
