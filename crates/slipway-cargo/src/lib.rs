//! Build tool invocation for slipway.
//!
//! This crate shells out to `cargo build --release --target <triple>` and,
//! when cross-compiling, to `rustup target add <triple>`. Build output is
//! streamed to the CI log; a non-zero exit from the build tool is fatal.
//!
//! The program names are overridable through `SLIPWAY_CARGO_BIN` and
//! `SLIPWAY_RUSTUP_BIN`, which lets tests substitute fake tools.

use std::env;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Result of a command execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Whether the command succeeded (exit code 0)
    pub success: bool,
    /// Exit code (if available)
    pub exit_code: Option<i32>,
    /// Standard output (empty for streamed commands)
    pub stdout: String,
    /// Standard error (empty for streamed commands)
    pub stderr: String,
    /// Duration of execution
    pub duration_ms: u64,
}

impl CommandResult {
    /// Create a result from a process output.
    pub fn from_output(output: &Output, duration: Duration) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: duration.as_millis() as u64,
        }
    }

    /// Fail with the exit code and captured stderr unless the command succeeded.
    pub fn ok(&self) -> Result<&Self> {
        if self.success {
            Ok(self)
        } else if self.stderr.is_empty() {
            Err(anyhow::anyhow!(
                "command failed with exit code {:?}",
                self.exit_code
            ))
        } else {
            Err(anyhow::anyhow!(
                "command failed with exit code {:?}: {}",
                self.exit_code,
                self.stderr.trim()
            ))
        }
    }
}

/// Build the argument list for a release build of `target`.
pub fn build_args(target: &str) -> Vec<String> {
    vec![
        "build".to_string(),
        "--release".to_string(),
        "--target".to_string(),
        target.to_string(),
    ]
}

/// Run `cargo build --release --target <triple>` in `workspace_root`,
/// streaming output to the parent's stdout/stderr.
pub fn cargo_build(workspace_root: &Path, target: &str) -> Result<CommandResult> {
    let start = Instant::now();

    let output = Command::new(cargo_program())
        .args(build_args(target))
        .current_dir(workspace_root)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .output()
        .context("failed to execute cargo build; is Cargo installed?")?;

    Ok(CommandResult::from_output(&output, start.elapsed()))
}

/// Run `rustup target add <triple>`, capturing output.
///
/// Needed before cross-compiling for an architecture the host toolchain
/// does not have installed.
pub fn rustup_target_add(target: &str) -> Result<CommandResult> {
    let start = Instant::now();

    let output = Command::new(rustup_program())
        .args(["target", "add", target])
        .output()
        .context("failed to execute rustup target add; is rustup installed?")?;

    Ok(CommandResult::from_output(&output, start.elapsed()))
}

fn cargo_program() -> String {
    env::var("SLIPWAY_CARGO_BIN").unwrap_or_else(|_| "cargo".to_string())
}

fn rustup_program() -> String {
    env::var("SLIPWAY_RUSTUP_BIN").unwrap_or_else(|_| "rustup".to_string())
}
