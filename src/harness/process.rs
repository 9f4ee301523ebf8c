//! Shell subprocess execution with a wall-clock bound.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::HarnessError;

/// Captured result of one subprocess.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    /// stdout and stderr, merged by the shell
    pub output: String,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Lossy UTF-8 decode that drops NULs and other control bytes but keeps
/// newlines, tabs and carriage returns.
pub fn sanitize_output(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|&c| c == '\n' || c == '\r' || c == '\t' || c >= ' ')
        .collect()
}

/// Run `command` through the platform shell in `cwd`.
///
/// stderr is redirected into stdout by the shell so the captured buffer
/// preserves interleaving. `stdin` is streamed from a separate task so a
/// program that writes before reading cannot deadlock on a full pipe. On
/// unix the shell runs in its own process group, and the whole group is
/// killed if `timeout` elapses.
pub async fn run_shell(
    command: &str,
    cwd: &Path,
    stdin: Option<&str>,
    timeout: Duration,
) -> Result<ProcessOutput, HarnessError> {
    let (shell, shell_arg, script) = if cfg!(target_os = "windows") {
        ("cmd", "/C", format!("{} 2>&1", command))
    } else {
        ("/bin/sh", "-c", format!("exec 2>&1\n{}", command))
    };

    let mut cmd = Command::new(shell);
    cmd.arg(shell_arg)
        .arg(&script)
        .current_dir(cwd)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    // The shell leads its own group so a timeout reaches whatever it forked.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(|e| HarnessError::Launch {
        command: command.to_string(),
        source: e,
    })?;
    let pid = child.id();

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        let bytes = input.as_bytes().to_vec();
        tokio::spawn(async move {
            // The program may exit without reading all input; a broken pipe is fine.
            if let Err(e) = pipe.write_all(&bytes).await {
                tracing::debug!("stdin write ended early: {}", e);
            }
        });
    }

    let started = Instant::now();
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            kill_process_group(pid);
            return Err(HarnessError::Io {
                context: format!("waiting for `{}`", command),
                source: e,
            })
        }
        Err(_) => {
            tracing::error!(command = %command, timeout_secs = timeout.as_secs_f64(), "Subprocess timed out");
            kill_process_group(pid);
            return Err(HarnessError::TimedOut {
                command: command.to_string(),
                timeout,
            });
        }
    };

    Ok(ProcessOutput {
        exit_code: output.status.code(),
        output: sanitize_output(&output.stdout),
        elapsed: started.elapsed(),
    })
}

/// SIGKILL the process group led by `pid`, taking grandchildren with it.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) else {
        return;
    };
    // SAFETY: killpg only sends a signal; a stale group id yields ESRCH.
    if unsafe { libc::killpg(pid, libc::SIGKILL) } != 0 {
        tracing::debug!(pid, "Process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_stderr_together() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = run_shell("echo out; echo err >&2", dir.path(), None, Duration::from_secs(5))
            .await
            .expect("run");
        assert!(out.success());
        assert_eq!(out.output, "out\nerr\n");
    }

    #[tokio::test]
    async fn feeds_stdin_and_reports_exit_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = run_shell("cat; exit 3", dir.path(), Some("abc\n"), Duration::from_secs(5))
            .await
            .expect("run");
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.output, "abc\n");
    }

    #[tokio::test]
    async fn unread_stdin_does_not_fail() {
        let dir = tempfile::tempdir().expect("tempdir");
        let big = "x".repeat(1 << 20);
        let out = run_shell("echo done", dir.path(), Some(&big), Duration::from_secs(5))
            .await
            .expect("run");
        assert_eq!(out.output, "done\n");
    }

    #[tokio::test]
    async fn timeout_is_a_harness_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = run_shell("sleep 5", dir.path(), None, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn timeout_kills_forked_children() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = run_shell(
            "sh -c 'sleep 1; echo late > late.txt'; true",
            dir.path(),
            None,
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HarnessError::TimedOut { .. }));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!dir.path().join("late.txt").exists());
    }

    #[tokio::test]
    async fn missing_working_directory_is_a_launch_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope");
        let err = run_shell("true", &missing, None, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Launch { .. }));
    }

    #[test]
    fn sanitize_keeps_line_structure() {
        assert_eq!(sanitize_output(b"a\r\nb\x00\tc"), "a\r\nb\tc");
    }
}
