//! Subprocess invocation for the external command-line collaborators
//! (platform CLI, secret store lookup).
//!
//! Tools are resolved on `PATH` up front so a missing binary is reported as
//! [`SyncError::ToolNotInstalled`] instead of a generic spawn error. Stdout
//! is returned on success; on a non-zero exit both streams are folded into
//! the error so the failure report shows what the tool printed.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::{Result, SyncError};

/// Resolve a program name or path to an executable.
pub fn resolve(program: &str) -> Result<PathBuf> {
    which::which(program).map_err(|_| SyncError::ToolNotInstalled(program.to_string()))
}

/// Run `program` with `args`, adding `envs` to the inherited environment.
pub fn run_tool(program: &str, args: &[String], envs: &[(&str, &str)]) -> Result<String> {
    let bin = resolve(program)?;

    let mut cmd = Command::new(&bin);
    cmd.args(args).stdin(Stdio::null());
    for (k, v) in envs {
        cmd.env(k, v);
    }

    let output = cmd.output()?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SyncError::ToolFailed {
            tool: program.to_string(),
            status: output.status.to_string(),
            output: combine(&stdout, &stderr),
        });
    }

    Ok(stdout)
}

pub(crate) fn combine(stdout: &str, stderr: &str) -> String {
    let stdout = stdout.trim_end();
    let stderr = stderr.trim_end();
    match (stdout.is_empty(), stderr.is_empty()) {
        (true, _) => stderr.to_string(),
        (false, true) => stdout.to_string(),
        (false, false) => format!("{stdout}\n{stderr}"),
    }
}
