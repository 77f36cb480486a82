//! Shell execution
//!
//! Runs command lines through `sh -c`, the same way a pipeline `sh` step
//! does. Output is either captured and echoed once the command finishes,
//! or streamed line by line while it runs (useful for long `docker buildx`
//! builds). With `echo` off nothing reaches the terminal.
//!
//! ```rust,no_run
//! use buildline::{CommandRunner, ShellCommand, ShellConfig};
//!
//! let shell = ShellCommand::new(ShellConfig::default());
//! let result = shell.run("docker buildx version")?;
//! assert!(result.is_success());
//! # Ok::<(), buildline::BuildError>(())
//! ```

use super::traits::CommandRunner;
use crate::error::{BuildError, Result};
use parking_lot::Mutex;
use std::env;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shell execution configuration
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Working directory
    pub cwd: PathBuf,

    /// Shell to use (default: sh)
    pub shell: String,

    /// Enable streaming output
    pub streaming: bool,

    /// Copy command output to the terminal
    pub echo: bool,
}

impl ShellConfig {
    /// Same settings, captured and never echoed
    #[must_use]
    pub fn quiet(&self) -> Self {
        Self {
            streaming: false,
            echo: false,
            ..self.clone()
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            cwd: env::current_dir().unwrap_or_default(),
            shell: "sh".to_string(),
            streaming: false,
            echo: true,
        }
    }
}

/// Result of shell command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellResult {
    /// Standard output
    pub stdout: String,

    /// Standard error
    pub stderr: String,

    /// Exit code
    pub exit_code: i32,

    /// Duration of execution
    pub duration: Duration,
}

impl ShellResult {
    /// Successful result with the given stdout
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
            duration: Duration::ZERO,
        }
    }

    /// Returns true if command succeeded (exit code 0)
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns true if command failed
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.exit_code != 0
    }
}

/// Executes shell command lines
#[derive(Debug, Clone)]
pub struct ShellCommand {
    config: ShellConfig,
}

impl ShellCommand {
    /// Creates a new shell command runner
    #[must_use]
    pub fn new(config: ShellConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Executes a shell command
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Io`] when the shell cannot be spawned and
    /// [`BuildError::CommandFailed`] on a non-zero exit status.
    pub fn execute(&self, command: &str) -> Result<ShellResult> {
        let start = Instant::now();

        tracing::debug!(command = %command, shell = %self.config.shell, "Executing shell command");

        let result = if self.config.streaming {
            self.execute_streaming(command)
        } else {
            self.execute_captured(command)
        };

        result.map(|mut r| {
            r.duration = start.elapsed();
            tracing::debug!(duration_ms = r.duration.as_millis(), "Shell command finished");
            r
        })
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = Command::new(&self.config.shell);
        cmd.arg("-c");
        cmd.arg(command);
        cmd.current_dir(&self.config.cwd);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    /// Executes command with captured output
    fn execute_captured(&self, command: &str) -> Result<ShellResult> {
        let output = self
            .command(command)
            .output()
            .map_err(|e| BuildError::Io(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        let exit_code = output.status.code().unwrap_or(-1);

        if self.config.echo {
            if !stdout.is_empty() {
                print!("{stdout}");
            }
            if !stderr.is_empty() {
                eprint!("{stderr}");
            }
        }

        finish(stdout, stderr, exit_code)
    }

    /// Executes command with streaming output
    fn execute_streaming(&self, command: &str) -> Result<ShellResult> {
        let echo = self.config.echo;
        let mut child = self
            .command(command)
            .spawn()
            .map_err(|e| BuildError::Io(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BuildError::Io("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BuildError::Io("stderr was not captured".to_string()))?;

        let stdout_handle = Arc::new(Mutex::new(String::new()));
        let stderr_handle = Arc::new(Mutex::new(String::new()));

        let stdout_thread = {
            let stdout_handle = Arc::clone(&stdout_handle);
            std::thread::spawn(move || {
                let reader = io::BufReader::new(stdout);
                for line in reader.lines().map_while(std::result::Result::ok) {
                    if echo {
                        println!("{line}");
                    }
                    let mut guard = stdout_handle.lock();
                    guard.push_str(&line);
                    guard.push('\n');
                }
            })
        };

        // buildx writes its progress to stderr
        let stderr_thread = {
            let stderr_handle = Arc::clone(&stderr_handle);
            std::thread::spawn(move || {
                let reader = io::BufReader::new(stderr);
                for line in reader.lines().map_while(std::result::Result::ok) {
                    if echo {
                        eprintln!("{line}");
                    }
                    let mut guard = stderr_handle.lock();
                    guard.push_str(&line);
                    guard.push('\n');
                }
            })
        };

        let status = child.wait().map_err(|e| BuildError::Io(e.to_string()))?;
        let _ = stdout_thread.join();
        let _ = stderr_thread.join();

        let stdout = stdout_handle.lock().clone();
        let stderr = stderr_handle.lock().clone();

        finish(stdout, stderr, status.code().unwrap_or(-1))
    }
}

fn finish(stdout: String, stderr: String, exit_code: i32) -> Result<ShellResult> {
    if exit_code != 0 {
        return Err(BuildError::CommandFailed {
            code: exit_code,
            stderr,
        });
    }

    Ok(ShellResult {
        stdout,
        stderr,
        exit_code,
        duration: Duration::ZERO,
    })
}

impl CommandRunner for ShellCommand {
    fn run(&self, command: &str) -> Result<ShellResult> {
        self.execute(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_result_is_success() {
        let result = ShellResult {
            stdout: "output".to_string(),
            stderr: String::new(),
            exit_code: 0,
            duration: Duration::from_millis(100),
        };
        assert!(result.is_success());
        assert!(!result.is_failure());
    }

    #[test]
    fn test_shell_result_is_failure() {
        let result = ShellResult {
            stdout: String::new(),
            stderr: "error".to_string(),
            exit_code: 1,
            duration: Duration::from_millis(100),
        };
        assert!(!result.is_success());
        assert!(result.is_failure());
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_captures_stdout() {
        let shell = ShellCommand::new(ShellConfig::default());
        let result = shell.execute("echo hello").unwrap();
        assert_eq!(result.stdout.trim(), "hello");
        assert!(result.is_success());
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_reports_exit_code() {
        let shell = ShellCommand::new(ShellConfig::default());
        let err = shell.execute("echo nope >&2; exit 3").unwrap_err();
        match err {
            BuildError::CommandFailed { code, stderr } => {
                assert_eq!(code, 3);
                assert!(stderr.contains("nope"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_streaming_collects_output() {
        let config = ShellConfig {
            streaming: true,
            ..ShellConfig::default()
        };
        let shell = ShellCommand::new(config);
        let result = shell.execute("echo one; echo two").unwrap();
        assert_eq!(result.stdout, "one\ntwo\n");
    }

    #[test]
    fn test_quiet_keeps_cwd_and_shell() {
        let config = ShellConfig {
            cwd: PathBuf::from("/workspace"),
            shell: "bash".to_string(),
            streaming: true,
            echo: true,
        };
        let quiet = config.quiet();
        assert!(!quiet.echo);
        assert!(!quiet.streaming);
        assert_eq!(quiet.cwd, PathBuf::from("/workspace"));
        assert_eq!(quiet.shell, "bash");
    }

    #[cfg(unix)]
    #[test]
    fn test_quiet_still_captures_output() {
        let shell = ShellCommand::new(ShellConfig::default().quiet());
        let result = shell.run("printf ''; echo captured").unwrap();
        assert_eq!(result.stdout, "captured\n");
    }
}
