//! # Git Command Runner
//!
//! The command execution collaborator: runs an argument vector in a working
//! directory to completion and hands back the exit status with the captured
//! output. Nothing here interprets the output; callers decide what a failure
//! means.

use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::{debug, trace};

use crate::consts;
use crate::remote::redact_credentials;

/// Output from a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
  /// Exit code, `None` when the process was terminated by a signal.
  pub status: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl CommandOutput {
  /// Build a successful output with the given stdout.
  pub fn ok(stdout: impl Into<String>) -> Self {
    Self {
      status: Some(0),
      stdout: stdout.into(),
      stderr: String::new(),
    }
  }

  /// Build a failed output with the given exit code and stderr.
  pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
    Self {
      status: Some(code),
      stdout: String::new(),
      stderr: stderr.into(),
    }
  }

  /// Whether the command exited with status code 0.
  pub fn success(&self) -> bool {
    self.status == Some(0)
  }

  /// Combined stdout and stderr text with credentials redacted, for messages
  /// shown to the operator.
  pub fn combined(&self) -> String {
    let mut combined = String::new();
    if !self.stdout.trim().is_empty() {
      combined.push_str(self.stdout.trim_end());
    }
    if !self.stderr.trim().is_empty() {
      if !combined.is_empty() {
        combined.push('\n');
      }
      combined.push_str(self.stderr.trim_end());
    }
    redact_credentials(&combined)
  }
}

/// Runs external version-control commands.
pub trait CommandRunner {
  /// Run `args` inside `repo_path` and wait for it to finish.
  ///
  /// A non-zero exit is reported through [`CommandOutput::status`]; `Err` is
  /// reserved for failing to start the process at all.
  fn run(&self, repo_path: &Path, args: &[&str]) -> Result<CommandOutput>;
}

/// [`CommandRunner`] backed by the system `git` executable.
#[derive(Debug, Clone)]
pub struct SystemGit {
  executable: String,
}

impl Default for SystemGit {
  fn default() -> Self {
    Self::new(consts::GIT_EXECUTABLE)
  }
}

impl SystemGit {
  pub fn new(executable: impl Into<String>) -> Self {
    Self {
      executable: executable.into(),
    }
  }
}

impl CommandRunner for SystemGit {
  fn run(&self, repo_path: &Path, args: &[&str]) -> Result<CommandOutput> {
    let printable = redact_args(args).join(" ");
    debug!(cwd = %repo_path.display(), "$ git {printable}");

    let output = Command::new(&self.executable)
      .args(args)
      .current_dir(repo_path)
      // A rejected token must fail the push instead of blocking on a
      // username/password prompt.
      .env("GIT_TERMINAL_PROMPT", "0")
      .stdin(Stdio::null())
      .output()
      .with_context(|| format!("Failed to execute git command: git {printable}"))?;

    let result = CommandOutput {
      status: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).to_string(),
      stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };

    trace!(
      status = ?result.status,
      stderr = %redact_credentials(result.stderr.trim()),
      "git {printable} finished"
    );

    Ok(result)
  }
}

/// Copy of `args` safe to log: credentials embedded in URLs (including
/// `-c key=url` overrides) are replaced with a placeholder.
pub fn redact_args(args: &[&str]) -> Vec<String> {
  args.iter().map(|arg| redact_credentials(arg)).collect()
}
