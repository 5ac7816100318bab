//! # Branch Manager
//!
//! Everyday branch operations on a published repository, run through the
//! same [`CommandRunner`] as the publisher.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tracing::{debug, info};

use crate::git::{CommandOutput, CommandRunner};

/// A branch from `git branch --all` with its latest commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSummary {
  /// Local name, or `<remote>/<name>` for remote-tracking branches.
  pub name: String,
  pub current: bool,
  pub remote: bool,
  /// `<short hash> <subject>`, absent for a branch without commits.
  pub last_commit: Option<String>,
}

/// Branch operations scoped to one repository
pub struct BranchManager<'a> {
  runner: &'a dyn CommandRunner,
  repo_path: PathBuf,
}

impl<'a> BranchManager<'a> {
  pub fn new(runner: &'a dyn CommandRunner, repo_path: impl Into<PathBuf>) -> Self {
    Self {
      runner,
      repo_path: repo_path.into(),
    }
  }

  pub fn repo_path(&self) -> &Path {
    &self.repo_path
  }

  /// List local and remote-tracking branches with their latest commit.
  pub fn list(&self) -> Result<Vec<BranchSummary>> {
    let output = self.git("list branches", &["branch", "--all"])?;

    let mut branches = Vec::new();
    for line in output.stdout.lines() {
      let Some((name, current)) = parse_branch_line(line) else {
        continue;
      };

      let log = self
        .runner
        .run(&self.repo_path, &["log", "-1", "--pretty=format:%h %s", name.as_str(), "--"])?;
      let last_commit = log.success().then(|| log.stdout.trim().to_string());

      branches.push(BranchSummary {
        remote: line.trim_start().starts_with("remotes/"),
        name,
        current,
        last_commit,
      });
    }

    debug!(count = branches.len(), "Listed branches");
    Ok(branches)
  }

  pub fn create(&self, name: &str) -> Result<()> {
    validate_branch_name(name)?;
    self.git("create branch", &["branch", name])?;
    info!(branch = name, "Created branch");
    Ok(())
  }

  pub fn checkout(&self, name: &str) -> Result<()> {
    validate_branch_name(name)?;
    self.git("checkout branch", &["checkout", name])?;
    info!(branch = name, "Checked out branch");
    Ok(())
  }

  /// Merge `name` into the current branch.
  pub fn merge(&self, name: &str) -> Result<()> {
    validate_branch_name(name)?;
    self.git("merge branch", &["merge", name])?;
    info!(branch = name, "Merged branch");
    Ok(())
  }

  /// Delete a fully merged branch (`git branch -d`).
  pub fn delete(&self, name: &str) -> Result<()> {
    validate_branch_name(name)?;
    self.git("delete branch", &["branch", "-d", name])?;
    info!(branch = name, "Deleted branch");
    Ok(())
  }

  /// Record a commit undoing `commit`, without opening an editor.
  pub fn revert(&self, commit: &str) -> Result<()> {
    validate_revision(commit)?;
    self.git("revert commit", &["revert", "--no-edit", commit])?;
    info!(commit, "Reverted commit");
    Ok(())
  }

  /// The decorated commit graph across all branches.
  pub fn graph(&self) -> Result<String> {
    let output = self.git("show commit graph", &["log", "--oneline", "--graph", "--all"])?;
    Ok(output.stdout.trim_end().to_string())
  }

  fn git(&self, action: &str, args: &[&str]) -> Result<CommandOutput> {
    let output = self.runner.run(&self.repo_path, args)?;
    if !output.success() {
      bail!("Failed to {action}: {}", output.combined());
    }
    Ok(output)
  }
}

/// Parse one line of `git branch --all`. Symbolic refs (`a -> b`) and
/// detached-HEAD markers are skipped.
fn parse_branch_line(line: &str) -> Option<(String, bool)> {
  let trimmed = line.trim();
  if trimmed.is_empty() || trimmed.contains(" -> ") {
    return None;
  }

  let (current, name) = match trimmed.strip_prefix("* ") {
    Some(name) => (true, name),
    None => (false, trimmed.trim_start_matches("+ ")),
  };
  if name.starts_with('(') {
    return None;
  }

  let name = name.strip_prefix("remotes/").unwrap_or(name);
  Some((name.to_string(), current))
}

/// Check if a branch name is valid
pub fn validate_branch_name(name: &str) -> Result<()> {
  if name.is_empty() {
    bail!("Branch name cannot be empty");
  }

  // Would be parsed as an option by git
  if name.starts_with('-') {
    bail!("Branch name '{name}' cannot start with '-'");
  }

  if name.starts_with('/') || name.ends_with('/') || name.contains("//") {
    bail!("Branch name '{name}' has a misplaced '/'");
  }

  let invalid_chars = [' ', '~', '^', ':', '?', '*', '[', '\\'];
  if name.chars().any(|c| invalid_chars.contains(&c) || c.is_control()) {
    bail!("Branch name '{name}' contains a character git does not allow");
  }

  if name.chars().all(|c| c == '.') || name.contains("..") || name.ends_with(".lock") || name.contains("@{") {
    bail!("Branch name '{name}' is not a valid git ref name");
  }

  Ok(())
}

/// Check that a commit reference is a single argument git will not mistake
/// for an option.
pub fn validate_revision(revision: &str) -> Result<()> {
  if revision.is_empty() {
    bail!("Commit reference cannot be empty");
  }
  if revision.starts_with('-') || revision.chars().any(char::is_whitespace) {
    bail!("'{revision}' is not a commit reference");
  }
  Ok(())
}
