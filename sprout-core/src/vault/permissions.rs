//! Owner-only file permissions for the key and credential files.

use std::path::Path;

use anyhow::{Context, Result};

/// Platform-specific file permission operations
pub trait FilePermissions {
  /// Restrict the file to its owner
  fn set_secure_permissions(path: &Path) -> Result<()>;

  /// Check that no group or other access is granted
  fn has_secure_permissions(path: &Path) -> Result<bool>;
}

/// chmod-style permissions on Unix
#[cfg(unix)]
pub struct UnixFilePermissions;

#[cfg(unix)]
impl FilePermissions for UnixFilePermissions {
  fn set_secure_permissions(path: &Path) -> Result<()> {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path).context("Failed to get file metadata")?.permissions();
    perms.set_mode(0o600); // Owner read/write only
    fs::set_permissions(path, perms).context("Failed to set secure permissions")
  }

  fn has_secure_permissions(path: &Path) -> Result<bool> {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::metadata(path).context("Failed to get file metadata")?.permissions().mode();
    Ok(mode & 0o077 == 0)
  }
}

/// Platforms without Unix modes rely on the per-user profile directory ACLs.
#[cfg(not(unix))]
pub struct ProfileFilePermissions;

#[cfg(not(unix))]
impl FilePermissions for ProfileFilePermissions {
  fn set_secure_permissions(_path: &Path) -> Result<()> {
    Ok(())
  }

  fn has_secure_permissions(_path: &Path) -> Result<bool> {
    Ok(true)
  }
}

#[cfg(unix)]
pub type PlatformFilePermissions = UnixFilePermissions;

#[cfg(not(unix))]
pub type PlatformFilePermissions = ProfileFilePermissions;
