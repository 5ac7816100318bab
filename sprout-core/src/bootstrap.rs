//! # Repository Bootstrap
//!
//! Turns a plain project directory into a published repository: resolves the
//! credentials, initializes git, configures the committer, records an initial
//! commit, names the default branch and hands over to the [`Publisher`].

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::config::PublishConfig;
use crate::git::{CommandOutput, CommandRunner};
use crate::prompts::Identity;
use crate::publish::{Prepared, PublishReport, Publisher, RemoteTarget};

/// What bootstrap changed before publishing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
  /// `git init` was run because the directory had no `.git`.
  pub initialized: bool,
  /// The initial commit was recorded. `false` when there was nothing to
  /// commit.
  pub committed: bool,
  pub publish: PublishReport,
}

/// Bootstrap and publish the repository at `target`.
///
/// Credentials are resolved first so an operator who declines to enter a
/// token leaves the directory untouched.
pub fn bootstrap_repository(
  publisher: &Publisher<'_>,
  config: &PublishConfig,
  target: &RemoteTarget,
) -> Result<BootstrapReport> {
  let repo = target.repo_path();
  if !repo.is_dir() {
    bail!("Project path {} does not exist or is not a directory", repo.display());
  }

  let prepared = match publisher.prepare()? {
    Prepared::Ready(prepared) => prepared,
    Prepared::Abandoned(report) => {
      return Ok(BootstrapReport {
        initialized: false,
        committed: false,
        publish: report,
      });
    }
  };

  let runner = publisher.runner();

  let initialized = !repo.join(".git").exists();
  if initialized {
    run_checked(runner, repo, &["init"]).context("Failed to initialize repository")?;
    info!(path = %repo.display(), "Initialized git repository");
  }

  configure_identity(runner, repo, &prepared.identity(), config)?;

  run_checked(runner, repo, &["add", "."]).context("Failed to stage project files")?;

  let commit = runner.run(repo, &["commit", "-m", config.initial_commit_message.as_str()])?;
  let committed = commit.success();
  if !committed {
    warn!(output = %commit.combined(), "Initial commit was not created; continuing");
  }

  run_checked(runner, repo, &["branch", "-M", config.default_branch.as_str()])
    .with_context(|| format!("Failed to rename the current branch to {}", config.default_branch))?;

  let publish = publisher.finish(prepared, target)?;
  Ok(BootstrapReport {
    initialized,
    committed,
    publish,
  })
}

/// Write `user.name` and `user.email` at the configured scope. Empty values
/// are left unset.
fn configure_identity(runner: &dyn CommandRunner, repo: &Path, identity: &Identity, config: &PublishConfig) -> Result<()> {
  let scope = config.identity_scope.flag();
  for (key, value) in [("user.name", &identity.username), ("user.email", &identity.email)] {
    if value.trim().is_empty() {
      debug!(key, "Identity value empty, not configuring");
      continue;
    }
    run_checked(runner, repo, &["config", scope, key, value.trim()]).with_context(|| format!("Failed to set {key}"))?;
  }
  Ok(())
}

fn run_checked(runner: &dyn CommandRunner, repo: &Path, args: &[&str]) -> Result<CommandOutput> {
  let output = runner.run(repo, args)?;
  if !output.success() {
    bail!("git {} failed: {}", args.join(" "), output.combined());
  }
  Ok(output)
}
