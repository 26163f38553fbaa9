//! Shared process and filesystem helpers.

use anyhow::{Context, Result};
use std::fs;
use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Raw outcome of one captured child-process invocation.
///
/// `status` is `None` when the child terminated without reporting an exit
/// status (killed by a signal, or unreachable after a timeout kill).
#[derive(Debug)]
pub struct CapturedRun {
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
}

/// Spawn `command` with piped stdout/stderr, drain both streams on reader
/// threads, and wait for termination. With a timeout, the child is killed
/// once the limit elapses and the run is flagged `timed_out`.
pub fn capture_command(command: &mut Command, timeout: Option<Duration>) -> Result<CapturedRun> {
    let program = command.get_program().to_string_lossy().to_string();
    let mut child = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to start '{}'", program))?;

    let stdout = child
        .stdout
        .take()
        .context("Failed to capture child stdout")?;
    let stderr = child
        .stderr
        .take()
        .context("Failed to capture child stderr")?;

    // Drain on threads so a chatty child can't fill the pipe and deadlock
    // against our wait loop.
    let stdout_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        let mut reader = BufReader::new(stdout);
        let _ = reader.read_to_end(&mut buf);
        buf
    });
    let stderr_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        let mut reader = BufReader::new(stderr);
        let _ = reader.read_to_end(&mut buf);
        buf
    });

    let start = Instant::now();
    let mut timed_out = false;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if let Some(limit) = timeout {
                    if start.elapsed() >= limit {
                        timed_out = true;
                        let _ = child.kill();
                        break child.wait().ok();
                    }
                }
                thread::sleep(WAIT_POLL_INTERVAL);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to wait for '{}'", program))
            }
        }
    };
    let duration = start.elapsed();

    let stdout_bytes = stdout_handle.join().unwrap_or_default();
    let stderr_bytes = stderr_handle.join().unwrap_or_default();

    Ok(CapturedRun {
        status,
        stdout: String::from_utf8_lossy(&stdout_bytes).to_string(),
        stderr: String::from_utf8_lossy(&stderr_bytes).to_string(),
        duration,
        timed_out,
    })
}

/// Write `content` to `path` through a sibling temp file plus rename, so a
/// crash mid-write never leaves a truncated document behind.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory '{}'", parent.display()))?;
        }
    }

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, content)
        .with_context(|| format!("Failed to write '{}'", tmp_path.display()))?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err).with_context(|| format!("Failed to replace '{}'", path.display()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn capture_command_collects_both_streams() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; echo err >&2"]);
        let run = capture_command(&mut cmd, None).unwrap();
        assert_eq!(run.status.map(|s| s.success()), Some(true));
        assert_eq!(run.stdout.trim(), "out");
        assert_eq!(run.stderr.trim(), "err");
        assert!(!run.timed_out);
    }

    #[cfg(unix)]
    #[test]
    fn capture_command_kills_on_timeout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 5"]);
        let run = capture_command(&mut cmd, Some(Duration::from_millis(100))).unwrap();
        assert!(run.timed_out);
        assert_ne!(run.status.map(|s| s.success()), Some(true));
        assert!(run.duration < Duration::from_secs(5));
    }

    #[test]
    fn capture_command_reports_missing_program() {
        let mut cmd = Command::new("flakeward-no-such-binary");
        let err = capture_command(&mut cmd, None).unwrap_err();
        assert!(err.to_string().contains("flakeward-no-such-binary"));
    }

    #[test]
    fn write_atomic_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deep/out.json");
        write_atomic(&path, "{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn write_atomic_replaces_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_atomic(&path, "first").unwrap();
        write_atomic(&path, "second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }
}
