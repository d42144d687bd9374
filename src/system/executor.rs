//! # Process Executor
//!
//! The only place that spawns external processes. Filters run interactively
//! with inherited stdio against the workspace; git plumbing runs captured.

use dunce;
use std::collections::HashMap;
use std::path::Path;
use std::process::{Command as StdCommand, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command could not be parsed: {0}")]
    CommandParse(String),
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, std::io::Error),
    #[error("Command '{0}' exited with a non-zero error code.")]
    NonZeroExitStatus(String),
    #[error("Command '{command}' produced output that was not valid UTF-8")]
    InvalidUtf8Output {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Splits a command line into program and arguments, shell-style.
pub fn split_command_line(command_line: &str) -> Result<Vec<String>, ExecutionError> {
    shlex::split(command_line.trim())
        .ok_or_else(|| ExecutionError::CommandParse(command_line.to_string()))
}

/// Runs a filter process to completion with inherited stdio. The process
/// reads and writes the workspace through its working directory; failure is
/// signalled purely through the exit status.
pub fn run_interactive(
    program: &str,
    args: &[String],
    cwd: &Path,
    env_vars: &HashMap<String, String>,
) -> Result<(), ExecutionError> {
    let clean_cwd = dunce::simplified(cwd);
    let status = StdCommand::new(program)
        .args(args)
        .current_dir(clean_cwd)
        .envs(env_vars)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|e| ExecutionError::CommandFailed(program.to_string(), e))?;

    if !status.success() {
        return Err(ExecutionError::NonZeroExitStatus(program.to_string()));
    }
    Ok(())
}

/// Runs a short-lived command and captures its standard output. Stderr is
/// passed through so failures stay visible on the terminal.
pub fn run_captured(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
) -> Result<String, ExecutionError> {
    let mut command = StdCommand::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());
    if let Some(cwd) = cwd {
        command.current_dir(dunce::simplified(cwd));
    }

    let described = || format!("{} {}", program, args.join(" "));
    let output = command
        .output()
        .map_err(|e| ExecutionError::CommandFailed(described(), e))?;
    if !output.status.success() {
        return Err(ExecutionError::NonZeroExitStatus(described()));
    }
    String::from_utf8(output.stdout).map_err(|e| ExecutionError::InvalidUtf8Output {
        command: described(),
        source: e,
    })
}

/// Whether a program runs successfully with the given arguments. Used to
/// validate toolchain availability during the check phase.
pub fn probe(program: &str, args: &[&str]) -> bool {
    StdCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
