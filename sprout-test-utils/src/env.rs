//! XDG environment isolation.
//!
//! Points `XDG_CONFIG_HOME` and `XDG_DATA_HOME` at a throwaway directory so
//! the vault and config file of a test never touch the real profile.

use std::env;
use std::path::PathBuf;

use sprout_core::{ConfigDirs, Vault};
use tempfile::TempDir;

const XDG_VARS: [(&str, &str); 2] = [("XDG_CONFIG_HOME", "config"), ("XDG_DATA_HOME", "data")];

/// Redirects the XDG base directories into a temporary directory until
/// dropped, then restores the previous values.
pub struct EnvTestGuard {
  pub temp_dir: TempDir,
  saved: Vec<(&'static str, Option<String>)>,
}

impl Default for EnvTestGuard {
  fn default() -> Self {
    Self::new()
  }
}

impl EnvTestGuard {
  pub fn new() -> Self {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");

    let mut saved = Vec::with_capacity(XDG_VARS.len());
    for (var, subdir) in XDG_VARS {
      let dir = temp_dir.path().join(subdir);
      std::fs::create_dir_all(&dir).expect("Failed to create XDG directory");

      saved.push((var, env::var(var).ok()));
      // SAFETY: tests using this guard do not read the environment from other
      // threads while it is being modified.
      unsafe { env::set_var(var, &dir) };
    }

    Self { temp_dir, saved }
  }

  pub fn config_dir(&self) -> PathBuf {
    self.temp_dir.path().join("config")
  }

  pub fn data_dir(&self) -> PathBuf {
    self.temp_dir.path().join("data")
  }

  /// The sprout directories inside this environment, laid out the way
  /// `ConfigDirs::new` resolves them on Linux.
  pub fn config_dirs(&self) -> ConfigDirs {
    ConfigDirs {
      config_dir: self.config_dir().join("sprout"),
      data_dir: self.data_dir().join("sprout"),
    }
  }

  /// A vault stored inside this environment
  pub fn vault(&self) -> Vault {
    Vault::from_config_dirs(&self.config_dirs())
  }

  /// Environment overrides for a spawned `sprout` process.
  pub fn child_env(&self) -> Vec<(&'static str, PathBuf)> {
    XDG_VARS
      .iter()
      .map(|(var, subdir)| (*var, self.temp_dir.path().join(subdir)))
      .collect()
  }
}

impl Drop for EnvTestGuard {
  fn drop(&mut self) {
    for (var, previous) in self.saved.drain(..) {
      // SAFETY: see `EnvTestGuard::new`.
      match previous {
        Some(value) => unsafe { env::set_var(var, value) },
        None => unsafe { env::remove_var(var) },
      }
    }
  }
}
