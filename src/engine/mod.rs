// Core transcode orchestration - independent of any frontend

pub mod caps;
pub mod command;
pub mod diag;
pub mod encode_config;
pub mod ffmpeg_proc;
pub mod job;
pub mod progress;
pub mod transcode;

pub use caps::{select_variant, supports_multi_threaded_engine, EngineVariant, HostProbe, RuntimeProbe};
pub use command::{build_encode_args, build_probe_args, video_bitrate_bps, OUTPUT_NAME};
pub use encode_config::{
    validate, ConfigError, EncodeConfig, Preset, RawEncodeConfig, MAX_AUDIO_BITRATE_BPS,
    MAX_REF_FRAMES,
};
pub use ffmpeg_proc::FfmpegProcessEngine;
pub use job::{JobError, JobEvent, Outcome, PassOutput, PassReport, Phase, SourceFile, Transcoder};
pub use progress::{parse_timecode_cs, ProgressTracker, ABORT_MARKER, TIME_MARKER};
pub use transcode::{EngineError, LogLine, LogSink, TranscodeEngine};
