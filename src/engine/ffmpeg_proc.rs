use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;
use tracing::debug;

use super::caps::EngineVariant;
use super::transcode::{EngineError, LogLine, LogSink, TranscodeEngine};

/// Native engine backed by the ffmpeg/ffprobe binaries on PATH.
///
/// Inputs and outputs live in a private staging directory standing in for
/// the engine's virtual filesystem; log lines are the subprocess's own
/// stdout/stderr stream.
pub struct FfmpegProcessEngine {
    state: Mutex<State>,
    child: Mutex<Option<Child>>,
    terminate_requested: AtomicBool,
}

#[derive(Default)]
struct State {
    loaded: Option<EngineVariant>,
    workdir: Option<TempDir>,
    sink: Option<LogSink>,
}

impl FfmpegProcessEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            child: Mutex::new(None),
            terminate_requested: AtomicBool::new(false),
        }
    }

    fn workdir_path(&self) -> Result<PathBuf, EngineError> {
        let state = self.state.lock().unwrap();
        state
            .workdir
            .as_ref()
            .map(|dir| dir.path().to_path_buf())
            .ok_or_else(|| EngineError::Failed("engine not loaded".to_string()))
    }

    fn sink(&self) -> Option<LogSink> {
        self.state.lock().unwrap().sink.clone()
    }

    fn check_binary(name: &str) -> Result<(), EngineError> {
        let output = Command::new(name)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .map_err(|_| {
                EngineError::Failed(format!("{name} not found. Is it installed and in PATH?"))
            })?;
        if !output.status.success() {
            return Err(EngineError::Failed(format!(
                "{name} -version exited with {}",
                output.status
            )));
        }
        Ok(())
    }

    /// Spawn `program`, stream its output into the log sink line by line,
    /// and wait for it to exit. The child handle is published so that
    /// `terminate` can kill it from another thread.
    fn run_streaming(&self, program: &str, args: &[String]) -> Result<(), EngineError> {
        let workdir = self.workdir_path()?;
        let sink = self.sink();
        self.terminate_requested.store(false, Ordering::SeqCst);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut spawned = cmd.spawn()?;
        let stdout = spawned.stdout.take();
        let stderr = spawned.stderr.take();
        *self.child.lock().unwrap() = Some(spawned);

        let stderr_sink = sink.clone();
        let stderr_thread = std::thread::spawn(move || {
            let mut tail: Vec<String> = Vec::new();
            if let Some(stderr) = stderr {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    if let Some(sink) = &stderr_sink {
                        sink(LogLine { message: line.clone() });
                    }
                    tail.push(line);
                    if tail.len() > 8 {
                        tail.remove(0);
                    }
                }
            }
            tail
        });

        if let Some(stdout) = stdout {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if let Some(sink) = &sink {
                    sink(LogLine { message: line });
                }
            }
        }

        let status = {
            let mut guard = self.child.lock().unwrap();
            let mut child = guard.take().expect("child published above");
            child.wait()?
        };
        let stderr_tail = stderr_thread.join().unwrap_or_default();

        if self.terminate_requested.swap(false, Ordering::SeqCst) {
            debug!(program, "run stopped by terminate request");
            return Err(EngineError::Terminated);
        }
        if !status.success() {
            return Err(EngineError::Failed(stderr_tail.join("\n")));
        }
        Ok(())
    }
}

impl Default for FfmpegProcessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscodeEngine for FfmpegProcessEngine {
    fn load(&self, variant: EngineVariant) -> Result<(), EngineError> {
        {
            let state = self.state.lock().unwrap();
            if state.loaded == Some(variant) && state.workdir.is_some() {
                return Ok(());
            }
        }

        Self::check_binary("ffmpeg")?;
        Self::check_binary("ffprobe")?;

        let mut state = self.state.lock().unwrap();
        if state.workdir.is_none() {
            state.workdir = Some(TempDir::new()?);
        }
        state.loaded = Some(variant);
        debug!(variant = variant.display_name(), "engine loaded");
        Ok(())
    }

    fn write_input(&self, name: &str, bytes: &[u8]) -> Result<(), EngineError> {
        let path = self.workdir_path()?.join(name);
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn probe(&self, args: &[String]) -> Result<(), EngineError> {
        self.run_streaming("ffprobe", args)
    }

    fn exec(&self, args: &[String]) -> Result<(), EngineError> {
        let variant = self.state.lock().unwrap().loaded;
        match variant {
            Some(EngineVariant::SingleThreaded) => {
                // Pin the decoder and encoder to one thread for the
                // single-threaded build.
                let mut pinned: Vec<String> = vec!["-threads".into(), "1".into()];
                pinned.extend_from_slice(args);
                self.run_streaming("ffmpeg", &pinned)
            }
            Some(EngineVariant::MultiThreaded) => self.run_streaming("ffmpeg", args),
            None => Err(EngineError::Failed("engine not loaded".to_string())),
        }
    }

    fn read_output(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        let path = self.workdir_path()?.join(name);
        Ok(std::fs::read(path)?)
    }

    fn terminate(&self) {
        self.terminate_requested.store(true, Ordering::SeqCst);
        if let Some(child) = self.child.lock().unwrap().as_mut() {
            let _ = child.kill();
        }
    }

    fn set_log_sink(&self, sink: LogSink) {
        self.state.lock().unwrap().sink = Some(sink);
    }
}
