use thiserror::Error;

/// Marker preceding the timecode in the engine's periodic status lines.
pub const TIME_MARKER: &str = " time=";

/// Marker the engine emits when its runtime aborts while flushing; treated
/// as "the encode is finishing".
pub const ABORT_MARKER: &str = "Aborted(";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressParseError {
    #[error("malformed timecode {0:?}, expected HH:MM:SS.CC")]
    MalformedTimecode(String),
}

/// Parse an `HH:MM:SS.CC` timecode into total centiseconds. `:` and `.`
/// are both accepted as separators.
pub fn parse_timecode_cs(ts: &str) -> Result<u64, ProgressParseError> {
    let parts: Vec<&str> = ts.split([':', '.']).collect();
    if parts.len() != 4 {
        return Err(ProgressParseError::MalformedTimecode(ts.to_string()));
    }
    let mut fields = [0u64; 4];
    for (i, part) in parts.iter().enumerate() {
        fields[i] = part
            .parse::<u64>()
            .map_err(|_| ProgressParseError::MalformedTimecode(ts.to_string()))?;
    }
    let [h, m, s, c] = fields;
    Ok(((h * 60 + m) * 60 + s) * 100 + c)
}

/// Derives a 0-100 percentage from the engine's free-text log lines.
///
/// Holds no state beyond the total duration and the last raw line seen;
/// only a change in raw line content triggers a recomputation.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total_cs: u64,
    last_line: Option<String>,
}

impl ProgressTracker {
    pub fn new(duration_s: f64) -> Self {
        Self {
            total_cs: ((duration_s * 100.0).round() as u64).max(1),
            last_line: None,
        }
    }

    /// Consume one raw log line and report a percentage if the line is
    /// progress-bearing. Duplicate consecutive lines yield `Ok(None)`; a
    /// malformed timecode on a progress-bearing line is an error rather
    /// than a silent mis-parse.
    pub fn on_log_line(&mut self, line: &str) -> Result<Option<u32>, ProgressParseError> {
        if self.last_line.as_deref() == Some(line) {
            return Ok(None);
        }
        self.last_line = Some(line.to_string());

        if let Some(rest) = line.split_once(TIME_MARKER).map(|(_, rest)| rest) {
            let timecode = rest.split(' ').next().unwrap_or(rest);
            let done_cs = parse_timecode_cs(timecode)?;
            return Ok(Some(((done_cs * 100 / self.total_cs) as u32).min(100)));
        }

        if line.contains(ABORT_MARKER) {
            return Ok(Some(100));
        }

        Ok(None)
    }
}
