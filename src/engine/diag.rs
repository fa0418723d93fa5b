use anyhow::{Context, Result};
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const DIAG_LOG_NAME: &str = "progenc.log";

/// Where diagnostics lines land: `progenc.log` in the current directory.
pub fn diag_log_path() -> Result<PathBuf> {
    Ok(std::env::current_dir()?.join(DIAG_LOG_NAME))
}

/// Append one timestamped, source-tagged line to the diagnostics log,
/// creating the file on first use. Only called while the diagnostics
/// toggle is on.
pub fn write_diag_log(source: &str, message: &str) -> Result<()> {
    append_line(&diag_log_path()?, source, message)
}

fn append_line(path: &Path, source: &str, message: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open diagnostics log: {}", path.display()))?;
    writeln!(
        file,
        "[{}] [{source}] {message}",
        Local::now().format("%Y-%m-%d %H:%M:%S%.3f")
    )
    .with_context(|| format!("Failed to write diagnostics log: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_tagged_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DIAG_LOG_NAME);

        append_line(&path, "engine", "frame= 1 time=00:00:01.00").unwrap();
        append_line(&path, "engine", "Aborted(native code)").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[engine] frame= 1 time=00:00:01.00"));
        assert!(lines[1].ends_with("[engine] Aborted(native code)"));
        // Every line opens with a bracketed timestamp.
        assert!(lines.iter().all(|l| l.starts_with('[')));
    }
}
