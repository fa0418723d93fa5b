use crate::cli::{Cli, Commands};
use anyhow::{Context, Result};
use progenc::config::Config;
use progenc::engine::{
    self, build_encode_args, select_variant, validate, EncodeConfig, FfmpegProcessEngine,
    HostProbe, JobEvent, LogLine, Outcome, Phase, RawEncodeConfig, SourceFile, TranscodeEngine,
    Transcoder,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

pub fn run(cli: Cli) {
    let diagnostics = cli.diagnostics;
    let result = match cli.command {
        Commands::CheckEngine => handle_check_engine(),
        Commands::Probe { file } => handle_probe(&file),
        Commands::Convert {
            file,
            output,
            preset,
            target_size,
            audio_bitrate,
            fps,
            width,
            height,
            ref_frames,
            progressive,
            queries,
        } => handle_convert(ConvertArgs {
            file,
            output,
            preset,
            target_size,
            audio_bitrate,
            fps,
            width,
            height,
            ref_frames,
            progressive,
            queries,
            diagnostics,
        }),
        Commands::DryRun {
            file,
            preset,
            target_size,
            audio_bitrate,
            fps,
            width,
            height,
            ref_frames,
            assume_duration,
        } => handle_dry_run(
            &file,
            RawOverrides {
                preset,
                target_size,
                audio_bitrate,
                fps,
                width,
                height,
                ref_frames,
            },
            assume_duration,
        ),
        Commands::InitConfig => handle_init_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

struct RawOverrides {
    preset: Option<String>,
    target_size: Option<i64>,
    audio_bitrate: Option<i64>,
    fps: Option<i64>,
    width: Option<i64>,
    height: Option<i64>,
    ref_frames: Option<i64>,
}

struct ConvertArgs {
    file: PathBuf,
    output: Option<PathBuf>,
    preset: Option<String>,
    target_size: Option<i64>,
    audio_bitrate: Option<i64>,
    fps: Option<i64>,
    width: Option<i64>,
    height: Option<i64>,
    ref_frames: Option<i64>,
    progressive: bool,
    queries: Option<PathBuf>,
    diagnostics: bool,
}

/// Layer CLI flag overrides on top of the persisted config-file defaults.
fn merged_raw_config(config: &Config, overrides: RawOverrides) -> RawEncodeConfig {
    let mut raw = config.to_raw_config();
    if overrides.preset.is_some() {
        raw.video_preset = overrides.preset;
    }
    if overrides.target_size.is_some() {
        raw.target_size_bits = overrides.target_size;
    }
    if overrides.audio_bitrate.is_some() {
        raw.audio_bitrate_bps = overrides.audio_bitrate;
    }
    if overrides.fps.is_some() {
        raw.video_fps = overrides.fps;
    }
    if overrides.width.is_some() {
        raw.video_width = overrides.width;
        raw.video_height = overrides.height;
    }
    if overrides.ref_frames.is_some() {
        raw.video_ref_frames = overrides.ref_frames;
    }
    raw
}

fn handle_check_engine() -> Result<()> {
    let engine = FfmpegProcessEngine::new();
    let variant = select_variant(&HostProbe);
    engine
        .load(variant)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("Engine check failed")?;
    println!("Engine available ({})", variant.display_name());
    Ok(())
}

fn handle_probe(file: &Path) -> Result<()> {
    let bytes = std::fs::read(file)
        .with_context(|| format!("Failed to read input file: {}", file.display()))?;
    let name = file_name(file)?;

    let engine = FfmpegProcessEngine::new();
    let last_line: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    {
        let last_line = last_line.clone();
        engine.set_log_sink(Arc::new(move |line: LogLine| {
            *last_line.lock().unwrap() = Some(line.message);
        }));
    }

    let variant = select_variant(&HostProbe);
    engine.load(variant).map_err(|e| anyhow::anyhow!("{e}"))?;
    engine
        .write_input(name, &bytes)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    engine
        .probe(&engine::build_probe_args(name))
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let line = last_line.lock().unwrap().clone();
    let duration = line
        .as_deref()
        .and_then(|l| l.trim().parse::<f64>().ok())
        .context("Could not get video duration")?;
    println!("{}: {:.2}s", file.display(), duration);
    Ok(())
}

fn handle_convert(args: ConvertArgs) -> Result<()> {
    let config = Config::load().unwrap_or_default();
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read input file: {}", args.file.display()))?;
    let name = file_name(&args.file)?;
    let source = SourceFile { name, bytes: &bytes };

    let (tx, rx) = mpsc::channel::<JobEvent>();
    let printer = std::thread::spawn(move || print_events(rx));

    let transcoder = Transcoder::new(
        Arc::new(FfmpegProcessEngine::new()),
        Box::new(HostProbe),
        Some(tx),
    );
    transcoder.set_diagnostics(args.diagnostics || config.defaults.diagnostics);

    let merged = merged_raw_config(
        &config,
        RawOverrides {
            preset: args.preset,
            target_size: args.target_size,
            audio_bitrate: args.audio_bitrate,
            fps: args.fps,
            width: args.width,
            height: args.height,
            ref_frames: args.ref_frames,
        },
    );
    let defaults = validate(&merged, &EncodeConfig::default())?;
    transcoder.set_defaults(defaults);

    let outcome = if let Some(queries_path) = &args.queries {
        let content = std::fs::read_to_string(queries_path)
            .with_context(|| format!("Failed to read queries file: {}", queries_path.display()))?;
        let raws: Vec<RawEncodeConfig> =
            serde_json::from_str(&content).context("Failed to parse queries file")?;
        transcoder.custom_queries(&raws)?;
        transcoder.submit(&source)?
    } else if args.progressive {
        transcoder.progressive(&source)?
    } else {
        transcoder.submit(&source)?
    };

    drop(transcoder);
    let _ = printer.join();

    match outcome {
        Outcome::Superseded => {
            println!("aborted");
            Ok(())
        }
        Outcome::Completed(reports) => {
            let multiple = reports.len() > 1;
            let mut failed = 0usize;
            for report in &reports {
                match &report.result {
                    Ok(output) => {
                        let path = output_path(&args.file, args.output.as_deref(), &report.label, multiple);
                        std::fs::write(&path, &output.data).with_context(|| {
                            format!("Failed to write output file: {}", path.display())
                        })?;
                        println!("{}: {} bytes", path.display(), output.data.len());
                    }
                    Err(e) => {
                        failed += 1;
                        eprintln!("{}: {e}", report.label);
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} of {} passes failed", reports.len());
            }
            Ok(())
        }
    }
}

fn handle_dry_run(file: &Path, overrides: RawOverrides, assume_duration: f64) -> Result<()> {
    let config = Config::load().unwrap_or_default();
    let merged = merged_raw_config(&config, overrides);
    let validated = validate(&merged, &EncodeConfig::default())?;
    let name = file_name(file)?;
    let args = build_encode_args(name, &validated, assume_duration);
    println!("ffmpeg {}", args.join(" "));
    Ok(())
}

fn handle_init_config() -> Result<()> {
    let path = Config::config_path()?;
    if path.exists() {
        println!("Config exists: {}", path.display());
    } else {
        Config::default().save()?;
        println!("Created default config: {}", path.display());
    }
    Ok(())
}

fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .context("Input path has no usable file name")
}

/// Derive where a pass's output lands: explicit -o for single-pass runs,
/// otherwise a per-pass name next to the input.
fn output_path(input: &Path, output: Option<&Path>, label: &str, multiple: bool) -> PathBuf {
    if let Some(output) = output {
        if !multiple {
            return output.to_path_buf();
        }
    }
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let slug = label.to_lowercase().replace([' ', '/'], "-");
    let name = if multiple {
        format!("{stem}.{slug}.mp4")
    } else {
        format!("{stem}.out.mp4")
    };
    input.with_file_name(name)
}

/// Render job events as a single-line status display, JS-era wording kept.
fn print_events(rx: mpsc::Receiver<JobEvent>) {
    for event in rx {
        match event {
            JobEvent::Phase { label, phase, .. } => {
                let text = match phase {
                    Phase::Idle => continue,
                    Phase::Preparing => "Preparing ...".to_string(),
                    Phase::LoadingEngine => "Loading engine ...".to_string(),
                    Phase::Importing => "Importing video ...".to_string(),
                    Phase::ProbingDuration => "Get video duration ...".to_string(),
                    Phase::Encoding { .. } => "Converting video ... 0%".to_string(),
                    Phase::Exporting => "Export video ...".to_string(),
                    Phase::Done => "Conversion finished!".to_string(),
                    Phase::Cancelled => "aborted".to_string(),
                };
                if label.is_empty() {
                    print!("\r\x1b[2K{text}");
                } else {
                    print!("\r\x1b[2K({label}) {text}");
                }
                let _ = std::io::stdout().flush();
            }
            JobEvent::Progress { label, percent, .. } => {
                print!("\r\x1b[2K({label}) Converting video ... {percent}%");
                let _ = std::io::stdout().flush();
            }
            JobEvent::PassCompleted { .. } => println!(),
            JobEvent::PassFailed { label, error, .. } => {
                println!();
                eprintln!("({label}) encoding failed: {error}");
            }
            JobEvent::PlaybackReady { label, .. } => {
                println!("({label}) ready for playback");
            }
        }
    }
    println!();
}
