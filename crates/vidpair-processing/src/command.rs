//! Shared helpers for spawning ffmpeg/ffprobe.

use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;

use crate::error::ProcessingError;

const DANGEROUS_CHARS: [char; 11] = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];

/// Reject executable paths that could smuggle shell syntax or climb directories.
pub(crate) fn validate_executable(path: &str) -> Result<(), ProcessingError> {
    if path.trim().is_empty() {
        return Err(ProcessingError::InvalidExecutable("empty path".into()));
    }
    if path.chars().any(|c| DANGEROUS_CHARS.contains(&c)) {
        return Err(ProcessingError::InvalidExecutable(format!(
            "{} contains dangerous characters",
            path
        )));
    }
    if path.contains("..") {
        return Err(ProcessingError::InvalidExecutable(format!(
            "{} contains directory traversal",
            path
        )));
    }
    Ok(())
}

/// Fail early with a readable error when the input file is missing.
pub(crate) async fn ensure_input(path: &Path) -> Result<u64, ProcessingError> {
    let metadata = tokio::fs::metadata(path).await?;
    if !metadata.is_file() {
        return Err(ProcessingError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a regular file", path.display()),
        )));
    }
    Ok(metadata.len())
}

/// Run a tool to completion, capturing stdout and stderr.
///
/// A non-zero exit status is turned into an error with `failure`, carrying stderr.
pub(crate) async fn run(
    program: &str,
    args: &[String],
    failure: impl FnOnce(String) -> ProcessingError,
) -> Result<Output, ProcessingError> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    if output.status.success() {
        return Ok(output);
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    Err(failure(if stderr.is_empty() {
        format!("{} exited with {}", program, output.status)
    } else {
        stderr
    }))
}
