//! Repository discovery helpers.

use std::path::{Path, PathBuf};

use git2::Repository;

/// Detect the working tree containing `path`, walking up parent directories.
pub fn detect_repository_from_path<P: AsRef<Path>>(path: P) -> Option<PathBuf> {
  match Repository::discover(path.as_ref()) {
    Ok(repo) => repo.workdir().map(Path::to_path_buf),
    Err(_) => None,
  }
}
