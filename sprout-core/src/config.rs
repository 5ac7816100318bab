//! # Configuration Management
//!
//! Handles application configuration, directory management, and settings
//! for the sprout tool, including XDG base directory support.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::consts::{CONFIG_FILE_NAME, CREDENTIALS_FILE_NAME, KEY_FILE_NAME};

/// Represents the configuration directories for the sprout application
#[derive(Debug, Clone)]
pub struct ConfigDirs {
  pub config_dir: PathBuf,
  pub data_dir: PathBuf,
}

impl ConfigDirs {
  /// Create a new ConfigDirs instance
  pub fn new() -> Result<Self> {
    let proj_dirs = ProjectDirs::from("", "", "sprout").context("Failed to determine project directories")?;

    Ok(Self {
      config_dir: proj_dirs.config_dir().to_path_buf(),
      data_dir: proj_dirs.data_dir().to_path_buf(),
    })
  }

  /// Get the config directory
  pub fn config_dir(&self) -> &PathBuf {
    &self.config_dir
  }

  /// Get the data directory
  pub fn data_dir(&self) -> &PathBuf {
    &self.data_dir
  }

  /// Get the path to the symmetric key file
  pub fn key_path(&self) -> PathBuf {
    self.data_dir.join(KEY_FILE_NAME)
  }

  /// Get the path to the encrypted credential record
  pub fn credentials_path(&self) -> PathBuf {
    self.data_dir.join(CREDENTIALS_FILE_NAME)
  }

  /// Get the path to the configuration file
  pub fn config_path(&self) -> PathBuf {
    self.config_dir.join(CONFIG_FILE_NAME)
  }

  /// Load the configuration from file or return the defaults
  pub fn load_config(&self) -> Result<SproutConfig> {
    let config_path = self.config_path();

    if config_path.exists() {
      let content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

      let config: SproutConfig =
        toml::from_str(&content).with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

      Ok(config)
    } else {
      Ok(SproutConfig::default())
    }
  }
}

/// Get the configuration directories
pub fn get_config_dirs() -> Result<ConfigDirs> {
  ConfigDirs::new()
}

/// Top-level contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SproutConfig {
  pub publish: PublishConfig,
}

/// Settings for bootstrapping and publishing a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
  /// Branch the initial commit is renamed to before the first push
  pub default_branch: String,
  /// Message used for the bootstrap commit
  pub initial_commit_message: String,
  /// Bind `origin` to the token-bearing URL instead of passing it per push.
  /// When enabled git stores the token in `.git/config`.
  pub embed_token_in_origin: bool,
  /// Where `user.name` and `user.email` are written during bootstrap
  pub identity_scope: IdentityScope,
}

impl Default for PublishConfig {
  fn default() -> Self {
    Self {
      default_branch: "main".to_string(),
      initial_commit_message: "Initial commit 🚀".to_string(),
      embed_token_in_origin: false,
      identity_scope: IdentityScope::Global,
    }
  }
}

/// Git config scope for the committer identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityScope {
  #[default]
  Global,
  Local,
}

impl IdentityScope {
  /// The `git config` flag selecting this scope
  pub const fn flag(self) -> &'static str {
    match self {
      IdentityScope::Global => "--global",
      IdentityScope::Local => "--local",
    }
  }
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;

  fn dirs_in(temp_dir: &TempDir) -> ConfigDirs {
    ConfigDirs {
      config_dir: temp_dir.path().join("config"),
      data_dir: temp_dir.path().join("data"),
    }
  }

  #[test]
  fn test_vault_paths_live_in_data_dir() {
    let temp_dir = TempDir::new().unwrap();
    let config_dirs = dirs_in(&temp_dir);

    assert_eq!(config_dirs.key_path(), temp_dir.path().join("data/vault.key"));
    assert_eq!(
      config_dirs.credentials_path(),
      temp_dir.path().join("data/credentials.json")
    );
    assert_eq!(config_dirs.config_path(), temp_dir.path().join("config/config.toml"));
  }

  #[test]
  fn test_missing_config_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = dirs_in(&temp_dir).load_config().unwrap();

    assert_eq!(config, SproutConfig::default());
    assert_eq!(config.publish.default_branch, "main");
    assert!(!config.publish.embed_token_in_origin);
    assert_eq!(config.publish.identity_scope, IdentityScope::Global);
  }

  #[test]
  fn test_partial_config_keeps_defaults_for_missing_keys() {
    let temp_dir = TempDir::new().unwrap();
    let config_dirs = dirs_in(&temp_dir);
    fs::create_dir_all(config_dirs.config_dir()).unwrap();
    fs::write(
      config_dirs.config_path(),
      "[publish]\nembed_token_in_origin = true\nidentity_scope = \"local\"\n",
    )
    .unwrap();

    let config = config_dirs.load_config().unwrap();
    assert!(config.publish.embed_token_in_origin);
    assert_eq!(config.publish.identity_scope, IdentityScope::Local);
    assert_eq!(config.publish.default_branch, "main");
  }

  #[test]
  fn test_invalid_config_reports_path() {
    let temp_dir = TempDir::new().unwrap();
    let config_dirs = dirs_in(&temp_dir);
    fs::create_dir_all(config_dirs.config_dir()).unwrap();
    fs::write(config_dirs.config_path(), "[publish\n").unwrap();

    let err = config_dirs.load_config().unwrap_err();
    assert!(format!("{err:#}").contains("config.toml"));
  }
}
