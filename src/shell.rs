//! Command-execution collaborator.
//!
//! Providers that shell out hold a `CommandRunner` trait object
//! instead of inheriting helpers, so tests can substitute a scripted
//! runner and no provider ever spawns a process directly.

use anyhow::{Context, Result};
use std::io::Write;
use std::process::{Command, Output, Stdio};

/// Captured output of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
        }
    }
}

impl CommandOutput {
    /// Get stdout as a string.
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string.
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// Executes external commands on behalf of providers.
pub trait CommandRunner: Send + Sync {
    /// Run a command and capture its output.
    fn run(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Run a command, feeding `input` to its stdin.
    fn run_with_stdin(&self, cmd: &str, args: &[&str], input: &str) -> Result<CommandOutput>;

    /// Run a command and return just success/failure.
    fn run_status(&self, cmd: &str, args: &[&str]) -> Result<bool> {
        Ok(self.run(cmd, args)?.success)
    }

    /// Run a command and capture stdout, failing on a non-zero exit.
    fn run_capture(&self, cmd: &str, args: &[&str]) -> Result<String> {
        let output = self.run(cmd, args)?;
        if !output.success {
            anyhow::bail!(
                "{} {} failed: {}",
                cmd,
                args.join(" "),
                output.stderr_str().trim()
            );
        }
        Ok(output.stdout_str())
    }

    /// Check if a command exists on this system.
    fn command_exists(&self, cmd: &str) -> bool {
        self.run_status("which", &[cmd]).unwrap_or(false)
    }
}

/// `CommandRunner` backed by the real system.
pub struct SystemShell;

impl CommandRunner for SystemShell {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to execute: {} {}", cmd, args.join(" ")))?;
        Ok(output.into())
    }

    fn run_with_stdin(&self, cmd: &str, args: &[&str], input: &str) -> Result<CommandOutput> {
        let mut child = Command::new(cmd)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to execute: {} {}", cmd, args.join(" ")))?;

        child
            .stdin
            .as_mut()
            .context("child stdin not captured")?
            .write_all(input.as_bytes())?;

        let output = child
            .wait_with_output()
            .with_context(|| format!("failed to wait for: {cmd}"))?;
        Ok(output.into())
    }
}
