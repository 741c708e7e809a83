//! Process Runner (4.A): the single boundary between the pipeline and the OS.
//!
//! Grounded on the stderr-draining-thread pattern used elsewhere in this
//! workspace for wrapping ffmpeg: if both stdout and stderr are piped but only
//! one is read, a child that fills the other's 64KB pipe buffer deadlocks
//! against the parent. Here both streams are drained on dedicated threads
//! while the parent thread polls `try_wait()` against the cancellation token
//! and a size-derived deadline, so a cancelled or timed-out child is killed
//! promptly instead of only being noticed after `wait()` returns.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::cancel::CancellationToken;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("tool not found on PATH: {0}")]
    ToolNotFound(String),

    #[error("command `{command}` exited with {exit_code:?}: {stderr}")]
    ExecutionFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("command `{command}` cancelled")]
    Cancelled { command: String },

    #[error("command `{command}` timed out after {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },

    #[error("io error spawning `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl RunnerError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, RunnerError::Cancelled { .. })
    }
}

/// Per-invocation timeout derived from input size: `60s + 30s` per whole MiB,
/// per 4.A / §5. Probe calls pass a fixed 5s timeout instead of using this.
pub fn conversion_timeout(input_size_bytes: u64) -> Duration {
    let mib = (input_size_bytes as f64 / (1024.0 * 1024.0)).ceil() as u64;
    Duration::from_secs(60 + 30 * mib)
}

pub fn probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn command_line(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for a in args {
        line.push(' ');
        line.push_str(a);
    }
    line
}

fn drain_to_string(mut reader: impl Read + Send + 'static) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn kill_and_wait(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Runs `program` with `args` to completion, subject to `cancel` and
/// `timeout`. Returns captured stdout on success (exit code 0); any other
/// outcome is a `RunnerError`.
pub fn run(
    program: &str,
    args: &[String],
    cancel: &CancellationToken,
    timeout: Duration,
) -> Result<String, RunnerError> {
    if which::which(program).is_err() {
        return Err(RunnerError::ToolNotFound(program.to_string()));
    }

    let command = command_line(program, args);

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| RunnerError::Spawn {
            command: command.clone(),
            source,
        })?;

    let stdout = child.stdout.take().expect("stdout was piped");
    let stderr = child.stderr.take().expect("stderr was piped");
    let stdout_handle = drain_to_string(stdout);
    let stderr_handle = drain_to_string(stderr);

    let deadline = Instant::now() + timeout;
    let status = loop {
        if cancel.is_cancelled() {
            kill_and_wait(&mut child);
            let _ = stdout_handle.join();
            let _ = stderr_handle.join();
            return Err(RunnerError::Cancelled { command });
        }
        if Instant::now() >= deadline {
            kill_and_wait(&mut child);
            let _ = stdout_handle.join();
            let _ = stderr_handle.join();
            return Err(RunnerError::Timeout {
                command,
                timeout_secs: timeout.as_secs(),
            });
        }
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                return Err(RunnerError::Spawn { command, source });
            }
        }
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();

    if status.success() {
        Ok(stdout)
    } else {
        Err(RunnerError::ExecutionFailed {
            command,
            exit_code: status.code(),
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_successful_command() {
        let cancel = CancellationToken::new();
        let out = run("echo", &["hello".to_string()], &cancel, Duration::from_secs(5)).unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[test]
    fn reports_nonzero_exit() {
        let cancel = CancellationToken::new();
        let err = run("false", &[], &cancel, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, RunnerError::ExecutionFailed { .. }));
        assert!(!err.is_cancellation());
    }

    #[test]
    fn missing_tool_is_reported() {
        let cancel = CancellationToken::new();
        let err = run(
            "definitely-not-a-real-binary-xyz",
            &[],
            &cancel,
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, RunnerError::ToolNotFound(_)));
    }

    #[test]
    fn cancellation_is_distinguishable_from_execution_failure() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = run("sleep", &["5".to_string()], &cancel, Duration::from_secs(10)).unwrap_err();
        assert!(err.is_cancellation());
    }

    #[test]
    fn timeout_kills_long_running_child() {
        let cancel = CancellationToken::new();
        let err = run(
            "sleep",
            &["5".to_string()],
            &cancel,
            Duration::from_millis(100),
        )
        .unwrap_err();
        assert!(matches!(err, RunnerError::Timeout { .. }));
    }

    #[test]
    fn conversion_timeout_matches_formula() {
        assert_eq!(conversion_timeout(0), Duration::from_secs(60));
        assert_eq!(conversion_timeout(1024 * 1024), Duration::from_secs(90));
        assert_eq!(conversion_timeout(3 * 1024 * 1024), Duration::from_secs(150));
    }
}
