use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::caps::{select_variant, EngineVariant, RuntimeProbe};
use super::command::{build_encode_args, build_probe_args, OUTPUT_NAME};
use super::diag::write_diag_log;
use super::encode_config::{validate, ConfigError, EncodeConfig, Preset, RawEncodeConfig};
use super::progress::ProgressTracker;
use super::transcode::{EngineError, LogLine, TranscodeEngine};

/// A source video borrowed from the caller for the duration of one
/// submission.
#[derive(Debug, Clone, Copy)]
pub struct SourceFile<'a> {
    pub name: &'a str,
    pub bytes: &'a [u8],
}

/// Lifecycle phases of one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Preparing,
    LoadingEngine,
    Importing,
    ProbingDuration,
    Encoding { pass: usize, total: usize },
    Exporting,
    Done,
    Cancelled,
}

/// Status message sent to the owner of the event channel.
#[derive(Debug, Clone)]
pub enum JobEvent {
    Phase {
        submission: Uuid,
        label: String,
        phase: Phase,
    },
    Progress {
        submission: Uuid,
        label: String,
        percent: u32,
    },
    PassCompleted {
        submission: Uuid,
        label: String,
    },
    PassFailed {
        submission: Uuid,
        label: String,
        error: String,
    },
    /// A completed, non-superseded pass asked for playback.
    PlaybackReady {
        submission: Uuid,
        label: String,
    },
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not get video duration (probe reported {line:?})")]
    DurationProbe { line: Option<String> },

    #[error("encoding failed: {0}")]
    Encode(String),
}

/// The encoded result of one pass.
#[derive(Debug, Clone)]
pub struct PassOutput {
    pub label: String,
    pub config: EncodeConfig,
    pub data: Vec<u8>,
}

/// Per-pass result; passes are independent, so one failing does not stop
/// the ones scheduled after it.
#[derive(Debug)]
pub struct PassReport {
    pub label: String,
    pub result: Result<PassOutput, JobError>,
}

/// How a submission ended. Supersession is an outcome, not an error.
#[derive(Debug)]
pub enum Outcome {
    Completed(Vec<PassReport>),
    Superseded,
}

struct ActivePass {
    tracker: ProgressTracker,
    submission: Uuid,
    label: String,
    generation: u64,
}

/// Top-level coordinator: validates configs, compiles commands, runs passes
/// against the engine, and discards work superseded by a newer submission.
///
/// The generation counter is the only concurrency primitive: every
/// side-effecting step re-checks it, because any engine call may have let a
/// newer submission run first.
pub struct Transcoder {
    engine: Arc<dyn TranscodeEngine>,
    probe: Box<dyn RuntimeProbe>,
    generation: Arc<AtomicU64>,
    // Last raw log line, tagged with the generation current when it
    // arrived. Readers only trust lines carrying their own generation.
    last_log: Arc<Mutex<Option<(u64, String)>>>,
    active_pass: Arc<Mutex<Option<ActivePass>>>,
    defaults: Mutex<EncodeConfig>,
    queries: Mutex<Vec<EncodeConfig>>,
    events: Arc<Mutex<Option<Sender<JobEvent>>>>,
    diagnostics: Arc<AtomicBool>,
}

impl Transcoder {
    pub fn new(
        engine: Arc<dyn TranscodeEngine>,
        probe: Box<dyn RuntimeProbe>,
        events: Option<Sender<JobEvent>>,
    ) -> Self {
        let generation = Arc::new(AtomicU64::new(0));
        let last_log = Arc::new(Mutex::new(None));
        let active_pass: Arc<Mutex<Option<ActivePass>>> = Arc::new(Mutex::new(None));
        let events = Arc::new(Mutex::new(events));
        let diagnostics = Arc::new(AtomicBool::new(false));

        // Single log subscription for the life of the orchestrator; lines
        // are demultiplexed by content (duration capture, progress, abort).
        {
            let generation = generation.clone();
            let last_log = last_log.clone();
            let active_pass = active_pass.clone();
            let events = events.clone();
            let diagnostics = diagnostics.clone();
            engine.set_log_sink(Arc::new(move |line: LogLine| {
                let message = line.message;
                if diagnostics.load(Ordering::Relaxed) {
                    let _ = write_diag_log("engine", &message);
                }
                *last_log.lock().unwrap() =
                    Some((generation.load(Ordering::SeqCst), message.clone()));

                let mut guard = active_pass.lock().unwrap();
                if let Some(active) = guard.as_mut() {
                    if active.generation != generation.load(Ordering::SeqCst) {
                        return;
                    }
                    match active.tracker.on_log_line(&message) {
                        Ok(Some(percent)) => {
                            debug!(label = %active.label, percent, "converting");
                            if let Some(tx) = events.lock().unwrap().as_ref() {
                                let _ = tx.send(JobEvent::Progress {
                                    submission: active.submission,
                                    label: active.label.clone(),
                                    percent,
                                });
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!("unparseable progress line: {e}"),
                    }
                }
            }));
        }

        Self {
            engine,
            probe,
            generation,
            last_log,
            active_pass,
            defaults: Mutex::new(EncodeConfig::default()),
            queries: Mutex::new(Vec::new()),
            events,
            diagnostics,
        }
    }

    // --- configuration surface -------------------------------------------

    pub fn defaults(&self) -> EncodeConfig {
        self.defaults.lock().unwrap().clone()
    }

    /// Replace the default config wholesale (e.g. from the config file).
    pub fn set_defaults(&self, config: EncodeConfig) {
        *self.defaults.lock().unwrap() = config;
    }

    /// Select a preset. Also selects the recommended reference-frame count
    /// for that preset; call `set_ref_frames` afterwards to override it.
    pub fn set_preset(&self, preset: Preset) {
        let mut defaults = self.defaults.lock().unwrap();
        defaults.video_preset = preset;
        defaults.video_ref_frames = Some(preset.recommended_ref_frames());
    }

    pub fn set_ref_frames(&self, refs: Option<u32>) {
        self.defaults.lock().unwrap().video_ref_frames = refs;
    }

    pub fn set_target_size_bits(&self, bits: Option<u64>) {
        self.defaults.lock().unwrap().target_size_bits = bits;
    }

    pub fn set_audio_bitrate_bps(&self, bps: Option<u32>) {
        self.defaults.lock().unwrap().audio_bitrate_bps = bps;
    }

    pub fn set_resolution(&self, resolution: Option<(u32, u32)>) {
        self.defaults.lock().unwrap().video_resolution = resolution;
    }

    pub fn set_fps(&self, fps: Option<u32>) {
        self.defaults.lock().unwrap().video_fps = fps;
    }

    pub fn set_autoplay(&self, autoplay: bool) {
        self.defaults.lock().unwrap().autoplay_on_complete = autoplay;
    }

    pub fn set_diagnostics(&self, enabled: bool) {
        self.diagnostics.store(enabled, Ordering::Relaxed);
    }

    pub fn diagnostics(&self) -> bool {
        self.diagnostics.load(Ordering::Relaxed)
    }

    /// Queue a batch of discrete queries for the next `submit`. The whole
    /// batch is validated up front; a single bad config rejects all of it
    /// before any engine interaction.
    pub fn custom_queries(&self, raws: &[RawEncodeConfig]) -> Result<(), ConfigError> {
        let defaults = self.defaults();
        let mut validated = Vec::with_capacity(raws.len());
        for raw in raws {
            validated.push(validate(raw, &defaults)?);
        }
        *self.queries.lock().unwrap() = validated;
        Ok(())
    }

    // --- submission entry points -----------------------------------------

    /// Convert `file` once per queued query (one default pass if none are
    /// queued), labelled "Pass i/N".
    pub fn submit(&self, file: &SourceFile<'_>) -> Result<Outcome, JobError> {
        let mut configs = self.queries.lock().unwrap().clone();
        if configs.is_empty() {
            configs.push(self.defaults());
        }
        let total = configs.len();
        let passes = configs
            .into_iter()
            .enumerate()
            .map(|(i, config)| (format!("Pass {}/{}", i + 1, total), config))
            .collect();
        self.run_passes(file, passes)
    }

    /// Convert `file` once per raw config, validating the whole batch
    /// before any pass runs.
    pub fn convert_with(
        &self,
        file: &SourceFile<'_>,
        raws: &[RawEncodeConfig],
    ) -> Result<Outcome, JobError> {
        let defaults = self.defaults();
        let mut configs = Vec::with_capacity(raws.len());
        for raw in raws {
            configs.push(validate(raw, &defaults)?);
        }
        if configs.is_empty() {
            configs.push(defaults);
        }
        let total = configs.len();
        let passes = configs
            .into_iter()
            .enumerate()
            .map(|(i, config)| (format!("Pass {}/{}", i + 1, total), config))
            .collect();
        self.run_passes(file, passes)
    }

    /// Fast-then-quality cascade: a fixed cheap preview pass for immediate
    /// feedback, followed by a pass with the configured settings.
    pub fn progressive(&self, file: &SourceFile<'_>) -> Result<Outcome, JobError> {
        let defaults = self.defaults();
        let preview = EncodeConfig {
            audio_bitrate_bps: None,
            target_size_bits: None,
            video_fps: None,
            video_preset: Preset::Ultrafast,
            video_ref_frames: Some(1),
            video_resolution: Some((640, 360)),
            worker_count: defaults.worker_count,
            autoplay_on_complete: defaults.autoplay_on_complete,
        };
        self.run_passes(
            file,
            vec![
                ("Preview".to_string(), preview),
                ("Quality".to_string(), defaults),
            ],
        )
    }

    // --- internals --------------------------------------------------------

    fn emit(&self, event: JobEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    fn phase(&self, submission: Uuid, label: &str, phase: Phase) {
        debug!(label, ?phase, "phase change");
        self.emit(JobEvent::Phase {
            submission,
            label: label.to_string(),
            phase,
        });
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Interpret the result of one engine step. `Ok(true)` means proceed,
    /// `Ok(false)` means the submission was superseded (or the engine was
    /// terminated on our behalf) and all work must be discarded.
    fn step(
        &self,
        generation: u64,
        result: Result<(), EngineError>,
    ) -> Result<bool, JobError> {
        match result {
            Ok(()) => Ok(self.is_current(generation)),
            Err(EngineError::Terminated) => {
                warn!("Encoding was aborted");
                Ok(false)
            }
            Err(e) if !self.is_current(generation) => {
                // The engine failed because a newer submission tore it down
                // under us; that is a cancellation, not a failure.
                debug!("stale submission observed engine error: {e}");
                Ok(false)
            }
            Err(e) => Err(JobError::Encode(e.to_string())),
        }
    }

    fn run_passes(
        &self,
        file: &SourceFile<'_>,
        passes: Vec<(String, EncodeConfig)>,
    ) -> Result<Outcome, JobError> {
        let submission = Uuid::new_v4();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        // Supersede whatever is in flight before touching the engine.
        self.engine.terminate();

        self.phase(submission, "", Phase::Preparing);
        let variant = select_variant(&*self.probe);
        info!(
            submission = %submission,
            variant = variant.display_name(),
            passes = passes.len(),
            "submission accepted"
        );

        let total = passes.len();
        let mut reports = Vec::with_capacity(total);

        for (index, (label, config)) in passes.into_iter().enumerate() {
            match self.run_pass(
                submission,
                generation,
                variant,
                file,
                &label,
                &config,
                index + 1,
                total,
            )? {
                PassState::Completed(output) => {
                    self.emit(JobEvent::PassCompleted {
                        submission,
                        label: label.clone(),
                    });
                    if config.autoplay_on_complete {
                        self.emit(JobEvent::PlaybackReady {
                            submission,
                            label: label.clone(),
                        });
                    }
                    reports.push(PassReport {
                        label,
                        result: Ok(output),
                    });
                }
                PassState::Failed(error) => {
                    self.emit(JobEvent::PassFailed {
                        submission,
                        label: label.clone(),
                        error: error.to_string(),
                    });
                    reports.push(PassReport {
                        label,
                        result: Err(error),
                    });
                }
                PassState::Superseded => {
                    self.phase(submission, &label, Phase::Cancelled);
                    return Ok(Outcome::Superseded);
                }
            }
        }

        self.phase(submission, "", Phase::Done);
        Ok(Outcome::Completed(reports))
    }

    #[allow(clippy::too_many_arguments)]
    fn run_pass(
        &self,
        submission: Uuid,
        generation: u64,
        variant: EngineVariant,
        file: &SourceFile<'_>,
        label: &str,
        config: &EncodeConfig,
        pass: usize,
        total: usize,
    ) -> Result<PassState, JobError> {
        self.phase(submission, label, Phase::LoadingEngine);
        if !self.step(generation, self.engine.load(variant))? {
            return Ok(PassState::Superseded);
        }

        self.phase(submission, label, Phase::Importing);
        if !self.step(generation, self.engine.write_input(file.name, file.bytes))? {
            return Ok(PassState::Superseded);
        }

        // The probe result arrives as a log line, not a return value.
        self.phase(submission, label, Phase::ProbingDuration);
        {
            // Drop our own leftover line, never one a newer submission
            // already captured.
            let mut slot = self.last_log.lock().unwrap();
            if !slot.as_ref().is_some_and(|(owner, _)| *owner > generation) {
                *slot = None;
            }
        }
        if !self.step(generation, self.engine.probe(&build_probe_args(file.name)))? {
            return Ok(PassState::Superseded);
        }
        let line = {
            let slot = self.last_log.lock().unwrap();
            slot.as_ref()
                .filter(|(owner, _)| *owner == generation)
                .map(|(_, line)| line.clone())
        };
        let duration_s = line
            .as_deref()
            .and_then(|l| l.trim().parse::<f64>().ok())
            .filter(|d| *d > 0.0)
            .ok_or(JobError::DurationProbe { line })?;

        let args = build_encode_args(file.name, config, duration_s);

        self.phase(submission, label, Phase::Encoding { pass, total });
        *self.active_pass.lock().unwrap() = Some(ActivePass {
            tracker: ProgressTracker::new(duration_s),
            submission,
            label: label.to_string(),
            generation,
        });
        let exec_result = self.engine.exec(&args);
        {
            // Only tear down our own tracker; a newer submission may have
            // installed its own while our exec was finishing.
            let mut slot = self.active_pass.lock().unwrap();
            if slot.as_ref().is_some_and(|active| active.generation == generation) {
                *slot = None;
            }
        }

        match self.step(generation, exec_result) {
            Ok(true) => {}
            Ok(false) => return Ok(PassState::Superseded),
            Err(e) => {
                // Engine-stage errors abort only this pass.
                tracing::error!("Encoding failed: {e}");
                return Ok(PassState::Failed(e));
            }
        }

        self.phase(submission, label, Phase::Exporting);
        let data = match self.engine.read_output(OUTPUT_NAME) {
            Ok(data) => data,
            Err(EngineError::Terminated) => {
                warn!("Encoding was aborted");
                return Ok(PassState::Superseded);
            }
            Err(e) if !self.is_current(generation) => {
                debug!("stale submission observed engine error: {e}");
                return Ok(PassState::Superseded);
            }
            Err(e) => {
                tracing::error!("Encoding failed: {e}");
                return Ok(PassState::Failed(JobError::Encode(e.to_string())));
            }
        };

        // Last check before the result becomes visible: a newer submission
        // may have completed while we were exporting.
        if !self.is_current(generation) {
            return Ok(PassState::Superseded);
        }

        // Stop the engine worker so the next pass reloads a fresh one.
        self.engine.terminate();

        info!(label, bytes = data.len(), "pass finished");
        Ok(PassState::Completed(PassOutput {
            label: label.to_string(),
            config: config.clone(),
            data,
        }))
    }
}

enum PassState {
    Completed(PassOutput),
    Failed(JobError),
    Superseded,
}
