//! Git repository management for testing
//!
//! Temporary repositories built with git2 so tests can drive the real `git`
//! executable against a known starting state.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use git2::{Repository, Signature};
use tempfile::TempDir;

/// A temporary git repository with a committer identity configured locally.
pub struct GitRepoTestGuard {
  /// The temporary directory containing the git repository
  pub temp_dir: TempDir,
  /// The git repository
  pub repo: Repository,
}

impl GitRepoTestGuard {
  /// Create a new, empty test git repository
  pub fn new() -> Self {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let repo = Repository::init(temp_dir.path()).expect("Failed to initialize git repository");

    let mut config = repo.config().expect("Failed to get repository config");
    config
      .set_str("user.name", "Sprout Test User")
      .expect("Failed to set user.name");
    config
      .set_str("user.email", "sprout-test@example.com")
      .expect("Failed to set user.email");

    assert!(
      temp_dir.path().join(".git").exists(),
      "Git repository was not properly initialized"
    );

    Self { temp_dir, repo }
  }

  /// Create a test repository with one commit on its initial branch
  pub fn with_initial_commit() -> Self {
    let guard = Self::new();
    create_commit(&guard.repo, "README.md", "# test\n", "Initial commit").expect("Failed to create initial commit");
    guard
  }

  /// Get the path to the git repository
  pub fn path(&self) -> &Path {
    self.temp_dir.path()
  }

  /// Name of the branch HEAD points at
  pub fn current_branch(&self) -> String {
    self
      .repo
      .head()
      .ok()
      .and_then(|head| head.shorthand().map(str::to_string))
      .expect("HEAD does not point at a branch")
  }

  /// The URL `origin` is configured with, if it exists
  pub fn origin_url(&self) -> Option<String> {
    let remote = self.repo.find_remote("origin").ok()?;
    remote.url().map(str::to_string)
  }
}

impl Default for GitRepoTestGuard {
  fn default() -> Self {
    Self::new()
  }
}

/// Helper function to create a commit in a repository
pub fn create_commit(repo: &Repository, file_name: &str, content: &str, message: &str) -> Result<()> {
  let repo_path = repo.workdir().context("Repository has no working directory")?;
  fs::write(repo_path.join(file_name), content)?;

  let mut index = repo.index()?;
  index.add_path(Path::new(file_name))?;
  index.write()?;

  let tree_id = index.write_tree()?;
  let tree = repo.find_tree(tree_id)?;
  let signature = Signature::now("Test User", "test@example.com")?;

  let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
  let parents: Vec<_> = parent.iter().collect();
  repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;

  Ok(())
}
