use std::sync::Arc;
use thiserror::Error;

use super::caps::EngineVariant;

/// One record from the engine's log event stream.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub message: String,
}

/// Single consumer of the engine's log stream; subscribed once at
/// orchestrator construction.
pub type LogSink = Arc<dyn Fn(LogLine) + Send + Sync>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine was stopped by an explicit terminate request. Treated as
    /// cancellation by callers, never as a failure.
    #[error("engine terminated")]
    Terminated,

    #[error("engine failure: {0}")]
    Failed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn is_terminated(&self) -> bool {
        matches!(self, EngineError::Terminated)
    }
}

/// Capability interface over the external transcoding engine.
///
/// The engine is a singleton resource: at most one `exec` runs at a time,
/// and `terminate` must be callable from another thread while `exec` is
/// blocked, so every method takes `&self` and implementations manage their
/// own interior mutability.
pub trait TranscodeEngine: Send + Sync {
    /// Load the selected engine build. Idempotent no-op when already loaded
    /// with the same variant.
    fn load(&self, variant: EngineVariant) -> Result<(), EngineError>;

    /// Stage a source file inside the engine's virtual filesystem.
    fn write_input(&self, name: &str, bytes: &[u8]) -> Result<(), EngineError>;

    /// Run a metadata probe. The result is delivered as a log line, not a
    /// return value; callers capture the last line from the stream.
    fn probe(&self, args: &[String]) -> Result<(), EngineError>;

    /// Run one encode pass, emitting log lines while it runs.
    fn exec(&self, args: &[String]) -> Result<(), EngineError>;

    /// Retrieve a produced file from the engine's virtual filesystem.
    fn read_output(&self, name: &str) -> Result<Vec<u8>, EngineError>;

    /// Best-effort abort of whatever is running. The interrupted call
    /// reports `EngineError::Terminated`.
    fn terminate(&self);

    /// Install the single log sink. Replaces any previous sink.
    fn set_log_sink(&self, sink: LogSink);
}
