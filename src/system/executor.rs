// src/system/executor.rs

use crate::eval::CommandLine;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Child, Command as StdCommand, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Failures spawning or waiting for a process.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("No command specified to run.")]
    EmptyCommand,
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, std::io::Error),
    #[error("Command '{command}' did not finish within {} ms and was terminated.", .timeout.as_millis())]
    TimedOut { command: String, timeout: Duration },
    #[error("Command '{command}' produced output that was not valid UTF-8")]
    InvalidUtf8Output {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// How a spawned process should treat the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Inherit stdin, stdout and stderr.
    Inherit,
    /// Discard all process output.
    Discard,
}

impl OutputMode {
    fn stdio(self) -> Stdio {
        match self {
            Self::Inherit => Stdio::inherit(),
            Self::Discard => Stdio::null(),
        }
    }
}

/// Runs a command to completion and returns its exit code.
///
/// `cwd` is used unless the command carries its own working directory. With
/// a timeout, the child is polled and killed once the deadline passes.
pub fn run_command(
    command: &CommandLine,
    cwd: &Path,
    timeout: Option<Duration>,
    output: OutputMode,
) -> Result<i64, ExecutionError> {
    let (program, args) = command
        .arguments
        .split_first()
        .ok_or(ExecutionError::EmptyCommand)?;
    let display = command.to_string();
    let clean_cwd = dunce::simplified(command.working_directory.as_deref().unwrap_or(cwd));

    let spawn = |program: &str, args: &[String]| {
        StdCommand::new(program)
            .args(args)
            .current_dir(clean_cwd)
            .stdin(output.stdio())
            .stdout(output.stdio())
            .stderr(output.stdio())
            .spawn()
    };

    // Windows built-ins such as `echo` only exist inside `cmd`.
    let mut child = match spawn(program.as_str(), args) {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound && cfg!(target_os = "windows") => {
            log::debug!("Command '{}' not found. Retrying with cmd /C.", program);
            let mut wrapped = vec!["/C".to_string()];
            wrapped.extend(command.arguments.iter().cloned());
            spawn("cmd", wrapped.as_slice()).map_err(|e| ExecutionError::CommandFailed(display.clone(), e))?
        }
        Err(e) => return Err(ExecutionError::CommandFailed(display, e)),
    };

    let status = wait_with_timeout(&mut child, timeout, &display)?;
    Ok(exit_code(status))
}

fn wait_with_timeout(
    child: &mut Child,
    timeout: Option<Duration>,
    display: &str,
) -> Result<ExitStatus, ExecutionError> {
    let Some(timeout) = timeout else {
        return child
            .wait()
            .map_err(|e| ExecutionError::CommandFailed(display.to_string(), e));
    };

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                log::debug!(
                    "Timeout reached, killing child process (PID: {})...",
                    child.id()
                );
                if let Err(e) = child.kill() {
                    log::warn!("Failed to kill child process {}: {}", child.id(), e);
                }
                child.wait().ok();
                return Err(ExecutionError::TimedOut {
                    command: display.to_string(),
                    timeout,
                });
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(ExecutionError::CommandFailed(display.to_string(), e)),
        }
    }
}

/// Processes terminated by a signal have no code; they count as `-1`.
fn exit_code(status: ExitStatus) -> i64 {
    match status.code() {
        Some(code) => i64::from(code),
        None => {
            log::debug!("Process terminated without an exit code ({})", status);
            -1
        }
    }
}

/// Runs a command and captures its standard output.
///
/// Stderr is passed through to the terminal. No timeout applies; this is
/// meant for short queries issued from rule expressions.
pub fn execute_and_capture_output(
    command: &CommandLine,
    cwd: &Path,
) -> Result<(i64, String), ExecutionError> {
    let (program, args) = command
        .arguments
        .split_first()
        .ok_or(ExecutionError::EmptyCommand)?;
    let display = command.to_string();
    let clean_cwd = dunce::simplified(command.working_directory.as_deref().unwrap_or(cwd));

    let output = StdCommand::new(program)
        .args(args)
        .current_dir(clean_cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .output()
        .map_err(|e| ExecutionError::CommandFailed(display.clone(), e))?;

    let text = String::from_utf8(output.stdout).map_err(|e| ExecutionError::InvalidUtf8Output {
        command: display,
        source: e,
    })?;
    Ok((exit_code(output.status), text))
}
