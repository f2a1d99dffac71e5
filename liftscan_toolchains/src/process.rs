use std::ffi::{OsStr, OsString};
use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use liftscan_toolchain_api::{ToolchainError, ToolchainResult};
use wait_timeout::ChildExt;

/// Runs an external executable with captured output and a hard time limit.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    binary: OsString,
    timeout: Duration,
}

/// Captured output of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Decoded standard output.
    pub stdout: String,
    /// Decoded standard error.
    pub stderr: String,
}

impl ProcessRunner {
    /// Construct a runner for `binary` (a path or a name resolved via `PATH`).
    #[must_use]
    pub fn new(binary: impl AsRef<OsStr>, timeout: Duration) -> Self {
        Self {
            binary: binary.as_ref().to_os_string(),
            timeout,
        }
    }

    /// The configured executable.
    #[must_use]
    pub fn binary(&self) -> &Path {
        Path::new(&self.binary)
    }

    /// Run the executable with `args`, killing it when the budget runs out.
    ///
    /// # Errors
    ///
    /// Returns [`ToolchainError::Spawn`] when the process cannot start,
    /// [`ToolchainError::TimedOut`] when it exceeds the budget, and
    /// [`ToolchainError::Failed`] on a non-zero exit.
    pub fn run<I, S>(&self, tool: &'static str, args: I) -> ToolchainResult<ProcessOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.binary);
        command.args(args);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        tracing::debug!(tool, binary = ?self.binary, "spawning toolchain");
        let mut child = command
            .spawn()
            .map_err(|source| ToolchainError::Spawn { tool, source })?;

        let stdout_handle = child.stdout.take().map(|mut stdout| {
            thread::spawn(move || -> io::Result<Vec<u8>> {
                let mut buffer = Vec::new();
                stdout.read_to_end(&mut buffer)?;
                Ok(buffer)
            })
        });

        let stderr_handle = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || -> io::Result<Vec<u8>> {
                let mut buffer = Vec::new();
                stderr.read_to_end(&mut buffer)?;
                Ok(buffer)
            })
        });

        match child.wait_timeout(self.timeout) {
            Ok(Some(_)) => (),
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ToolchainError::TimedOut {
                    tool,
                    seconds: self.timeout.as_secs(),
                });
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ToolchainError::message(format!(
                    "failed waiting on {tool}: {err}"
                )));
            }
        }

        let status = child
            .wait()
            .map_err(|err| ToolchainError::message(format!("failed to reap {tool}: {err}")))?;

        let stdout = join_reader(stdout_handle, tool, "stdout")?;
        let stderr = join_reader(stderr_handle, tool, "stderr")?;

        if !status.success() {
            let code = status
                .code()
                .map_or_else(|| "terminated".to_string(), |c| c.to_string());
            return Err(ToolchainError::Failed {
                tool,
                status: code,
                stderr: stderr.trim().to_owned(),
            });
        }

        Ok(ProcessOutput { stdout, stderr })
    }
}

fn join_reader(
    handle: Option<thread::JoinHandle<io::Result<Vec<u8>>>>,
    tool: &str,
    stream: &str,
) -> ToolchainResult<String> {
    match handle {
        Some(handle) => {
            let bytes = handle
                .join()
                .map_err(|_| ToolchainError::message(format!("failed to join {tool} {stream} reader")))?
                .map_err(|err| {
                    ToolchainError::message(format!("failed to read {tool} {stream}: {err}"))
                })?;
            Ok(String::from_utf8_lossy(&bytes).to_string())
        }
        None => Ok(String::new()),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    use tempfile::TempDir;

    use super::*;

    fn script(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("tool.sh");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        let mut perms = fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("set perms");
        path
    }

    #[test]
    fn captures_stdout_of_successful_run() {
        let dir = TempDir::new().expect("tempdir");
        let runner = ProcessRunner::new(script(&dir, "echo \"got $1\""), Duration::from_secs(5));
        let output = runner.run("mock", ["input.rs"]).expect("run succeeds");
        assert_eq!(output.stdout.trim(), "got input.rs");
    }

    #[test]
    fn reports_non_zero_exit_with_stderr() {
        let dir = TempDir::new().expect("tempdir");
        let runner = ProcessRunner::new(script(&dir, "echo boom >&2\nexit 3"), Duration::from_secs(5));
        let err = runner.run("mock", Vec::<&str>::new()).expect_err("run fails");
        match err {
            ToolchainError::Failed { status, stderr, .. } => {
                assert_eq!(status, "3");
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn kills_process_after_timeout() {
        let dir = TempDir::new().expect("tempdir");
        let runner = ProcessRunner::new(script(&dir, "exec sleep 5"), Duration::from_millis(200));
        let err = runner.run("mock", Vec::<&str>::new()).expect_err("run times out");
        assert!(matches!(err, ToolchainError::TimedOut { tool: "mock", .. }));
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let runner = ProcessRunner::new("/nonexistent/liftscan-tool", Duration::from_secs(1));
        let err = runner.run("mock", Vec::<&str>::new()).expect_err("spawn fails");
        assert!(matches!(err, ToolchainError::Spawn { .. }));
    }
}
