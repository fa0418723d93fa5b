use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "progenc")]
#[command(about = "Transcode job orchestrator with progressive preview passes", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Mirror engine log lines into progenc.log
    #[arg(long, global = true)]
    pub diagnostics: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that the transcoding engine is available and report the
    /// selected variant
    CheckEngine,

    /// Probe a video file for its duration
    Probe {
        /// Path to the video file
        file: PathBuf,
    },

    /// Convert a video file
    Convert {
        /// Path to the video file
        file: PathBuf,

        /// Output path (defaults to <input stem>.out.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Encoder preset (ultrafast .. placebo)
        #[arg(long)]
        preset: Option<String>,

        /// Total size target in bits
        #[arg(long)]
        target_size: Option<i64>,

        /// Audio bitrate in bits per second
        #[arg(long)]
        audio_bitrate: Option<i64>,

        /// Frame-rate cap
        #[arg(long)]
        fps: Option<i64>,

        /// Resolution ceiling width (requires --height)
        #[arg(long, requires = "height")]
        width: Option<i64>,

        /// Resolution ceiling height (requires --width)
        #[arg(long, requires = "width")]
        height: Option<i64>,

        /// Reference frames (1-4); overrides the preset's recommendation
        #[arg(long)]
        ref_frames: Option<i64>,

        /// Run a cheap preview pass first, then the configured pass
        #[arg(long, conflicts_with = "queries")]
        progressive: bool,

        /// JSON file holding an array of query configs to run as discrete
        /// passes
        #[arg(long)]
        queries: Option<PathBuf>,
    },

    /// Show the compiled engine command without executing
    DryRun {
        /// Path to the video file
        file: PathBuf,

        /// Encoder preset (ultrafast .. placebo)
        #[arg(long)]
        preset: Option<String>,

        /// Total size target in bits
        #[arg(long)]
        target_size: Option<i64>,

        /// Audio bitrate in bits per second
        #[arg(long)]
        audio_bitrate: Option<i64>,

        /// Frame-rate cap
        #[arg(long)]
        fps: Option<i64>,

        /// Resolution ceiling width (requires --height)
        #[arg(long, requires = "height")]
        width: Option<i64>,

        /// Resolution ceiling height (requires --width)
        #[arg(long, requires = "width")]
        height: Option<i64>,

        /// Reference frames (1-4)
        #[arg(long)]
        ref_frames: Option<i64>,

        /// Duration to assume for the bitrate budget, in seconds
        #[arg(long, default_value_t = 60.0)]
        assume_duration: f64,
    },

    /// Show config status and location, or create default config if missing
    InitConfig,
}

pub fn parse() -> Cli {
    Cli::parse()
}
