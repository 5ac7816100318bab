//! # Credential Vault
//!
//! Durable, encrypted-at-rest storage of exactly one credential record per
//! local profile. The record is keyed implicitly by the single key file, not
//! by remote host.
//!
//! Deleting the key file invalidates every stored token. The vault then
//! reports the record as absent and the caller captures fresh credentials;
//! this is expected, not corruption handling gone wrong.

pub mod cipher;
pub mod permissions;

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use self::cipher::{CryptoError, KEY_LEN, Key, decrypt, encrypt};
use self::permissions::{FilePermissions, PlatformFilePermissions};
use crate::config::ConfigDirs;
use crate::prompts::Identity;
use crate::secret::SecretToken;

/// Errors raised by vault storage
#[derive(Debug, Error)]
pub enum VaultError {
  #[error("failed to {action} {}", .path.display())]
  Io {
    action: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(
    "key file {} holds {len} bytes instead of {expected}; remove it to generate a new key, then store the token again",
    .path.display(),
    expected = KEY_LEN
  )]
  MalformedKey { path: PathBuf, len: usize },

  #[error("failed to serialize credential record")]
  Serialize(#[from] serde_json::Error),

  #[error(transparent)]
  Crypto(#[from] CryptoError),
}

impl VaultError {
  fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
    Self::Io {
      action,
      path: path.to_path_buf(),
      source,
    }
  }
}

/// The decrypted credential record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
  pub username: String,
  pub email: String,
  /// `None` until a token has been captured.
  pub token: Option<SecretToken>,
}

impl CredentialRecord {
  pub fn new(identity: Identity, token: Option<SecretToken>) -> Self {
    Self {
      username: identity.username,
      email: identity.email,
      token,
    }
  }

  /// The usable token, if one is present and non-empty.
  pub fn token(&self) -> Option<&SecretToken> {
    self.token.as_ref().filter(|token| !token.is_empty())
  }

  pub fn identity(&self) -> Identity {
    Identity {
      username: self.username.clone(),
      email: self.email.clone(),
    }
  }
}

/// On-disk form of the record. `encrypted_token` is base64 of the cipher
/// blob, or empty when no token has been captured.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
  #[serde(default)]
  username: String,
  #[serde(default)]
  email: String,
  #[serde(default, alias = "token")]
  encrypted_token: String,
}

/// State of the stored record as seen by [`Vault::status`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordStatus {
  Missing,
  Unreadable,
  NoToken { username: String },
  Readable { username: String, email: String },
  Undecryptable { username: String },
}

/// Read-only health report of the vault files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultStatus {
  pub key_present: bool,
  /// Whether the key file holds exactly one key. `None` when it is missing.
  pub key_well_formed: Option<bool>,
  /// `None` when the key file is missing.
  pub key_permissions_secure: Option<bool>,
  pub record: RecordStatus,
}

/// Encrypted credential storage backed by a key file and a record file
#[derive(Debug, Clone)]
pub struct Vault {
  key_path: PathBuf,
  store_path: PathBuf,
}

impl Vault {
  pub fn new(key_path: impl Into<PathBuf>, store_path: impl Into<PathBuf>) -> Self {
    Self {
      key_path: key_path.into(),
      store_path: store_path.into(),
    }
  }

  /// Vault using the standard per-user locations
  pub fn from_config_dirs(config_dirs: &ConfigDirs) -> Self {
    Self::new(config_dirs.key_path(), config_dirs.credentials_path())
  }

  pub fn key_path(&self) -> &Path {
    &self.key_path
  }

  pub fn store_path(&self) -> &Path {
    &self.store_path
  }

  /// Return the key material, generating and persisting it on first use.
  ///
  /// An existing key file is never replaced. One that does not hold exactly
  /// [`KEY_LEN`] bytes fails with [`VaultError::MalformedKey`].
  pub fn load_key(&self) -> Result<Key, VaultError> {
    match self.existing_key()? {
      Some(key) => Ok(key),
      None => self.create_key(),
    }
  }

  /// Write a fresh key next to the key path and move it into place without
  /// clobbering, so the key file is either complete or absent.
  fn create_key(&self) -> Result<Key, VaultError> {
    let parent = parent_dir(&self.key_path);
    fs::create_dir_all(parent).map_err(|err| VaultError::io("create key directory", parent, err))?;

    let key = Key::generate();
    let mut temp =
      NamedTempFile::new_in(parent).map_err(|err| VaultError::io("create temporary key file", parent, err))?;
    temp
      .write_all(key.as_bytes())
      .and_then(|()| temp.as_file().sync_all())
      .map_err(|err| VaultError::io("write temporary key file", temp.path(), err))?;

    match temp.persist_noclobber(&self.key_path) {
      Ok(_) => {
        PlatformFilePermissions::set_secure_permissions(&self.key_path)
          .map_err(|err| VaultError::io("secure key file", &self.key_path, io::Error::other(err)))?;
        sync_dir(parent).map_err(|err| VaultError::io("sync key directory", parent, err))?;
        info!(path = %self.key_path.display(), "Generated new vault key");
        Ok(key)
      }
      // Another process created the key between our read and persist.
      Err(err) if err.error.kind() == ErrorKind::AlreadyExists => {
        drop(key);
        self
          .existing_key()?
          .ok_or_else(|| VaultError::io("read key file", &self.key_path, err.error))
      }
      Err(err) => Err(VaultError::io("create key file", &self.key_path, err.error)),
    }
  }

  fn existing_key(&self) -> Result<Option<Key>, VaultError> {
    match self.read_key()? {
      Some(key) if !key.is_well_formed() => Err(VaultError::MalformedKey {
        path: self.key_path.clone(),
        len: key.as_bytes().len(),
      }),
      key => Ok(key),
    }
  }

  fn read_key(&self) -> Result<Option<Key>, VaultError> {
    match fs::read(&self.key_path) {
      Ok(bytes) => Ok(Some(Key::from_bytes(bytes))),
      Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
      Err(err) => Err(VaultError::io("read key file", &self.key_path, err)),
    }
  }

  /// Encrypt the token and atomically replace the stored record.
  pub fn save(&self, record: &CredentialRecord) -> Result<(), VaultError> {
    let encrypted_token = match record.token() {
      Some(token) => {
        let key = self.load_key()?;
        BASE64.encode(encrypt(token.expose(), &key)?)
      }
      None => String::new(),
    };

    let stored = StoredRecord {
      username: record.username.clone(),
      email: record.email.clone(),
      encrypted_token,
    };
    let content = serde_json::to_vec_pretty(&stored)?;

    self.write_atomically(&content)?;
    info!(path = %self.store_path.display(), username = %record.username, "Saved credentials");
    Ok(())
  }

  fn write_atomically(&self, content: &[u8]) -> Result<(), VaultError> {
    let parent = parent_dir(&self.store_path);
    fs::create_dir_all(parent).map_err(|err| VaultError::io("create credential directory", parent, err))?;

    // The temporary file is created owner-only and lives next to the target
    // so the final rename stays on one filesystem.
    let mut temp = NamedTempFile::new_in(parent)
      .map_err(|err| VaultError::io("create temporary credential file", parent, err))?;
    temp
      .write_all(content)
      .and_then(|()| temp.as_file().sync_all())
      .map_err(|err| VaultError::io("write temporary credential file", temp.path(), err))?;

    temp
      .persist(&self.store_path)
      .map_err(|err| VaultError::io("replace credential file", &self.store_path, err.error))?;

    PlatformFilePermissions::set_secure_permissions(&self.store_path)
      .map_err(|err| VaultError::io("secure credential file", &self.store_path, io::Error::other(err)))?;
    sync_dir(parent).map_err(|err| VaultError::io("sync credential directory", parent, err))?;
    Ok(())
  }

  /// Read and decrypt the stored record.
  ///
  /// A record that cannot be parsed or decrypted is reported as absent so the
  /// caller falls back to capturing fresh credentials.
  pub fn load(&self) -> Result<Option<CredentialRecord>, VaultError> {
    let Some(stored) = self.read_stored()? else {
      return Ok(None);
    };

    if stored.encrypted_token.is_empty() {
      return Ok(Some(CredentialRecord {
        username: stored.username,
        email: stored.email,
        token: None,
      }));
    }

    let key = match self.load_key() {
      Ok(key) => key,
      Err(err @ VaultError::MalformedKey { .. }) => {
        warn!(error = %err, "Stored token cannot be decrypted; treating credentials as absent");
        return Ok(None);
      }
      Err(err) => return Err(err),
    };
    match decode_token(&stored.encrypted_token, &key) {
      Ok(token) => Ok(Some(CredentialRecord {
        username: stored.username,
        email: stored.email,
        token: Some(token),
      })),
      Err(err) => {
        warn!(
          path = %self.store_path.display(),
          error = %err,
          "Stored token cannot be decrypted with the current key; treating credentials as absent"
        );
        Ok(None)
      }
    }
  }

  fn read_stored(&self) -> Result<Option<StoredRecord>, VaultError> {
    let content = match fs::read_to_string(&self.store_path) {
      Ok(content) => content,
      Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
      Err(err) => return Err(VaultError::io("read credential file", &self.store_path, err)),
    };

    match serde_json::from_str(&content) {
      Ok(stored) => Ok(Some(stored)),
      Err(err) => {
        warn!(path = %self.store_path.display(), error = %err, "Credential file is unreadable; treating as absent");
        Ok(None)
      }
    }
  }

  /// Remove the credential record. The key file is left in place.
  ///
  /// Returns whether a record existed.
  pub fn clear(&self) -> Result<bool, VaultError> {
    match fs::remove_file(&self.store_path) {
      Ok(()) => {
        info!(path = %self.store_path.display(), "Removed stored credentials");
        Ok(true)
      }
      Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
      Err(err) => Err(VaultError::io("remove credential file", &self.store_path, err)),
    }
  }

  /// Inspect the vault files without creating or modifying anything.
  pub fn status(&self) -> Result<VaultStatus, VaultError> {
    let key = self.read_key()?;
    let key_well_formed = key.as_ref().map(Key::is_well_formed);
    let key_permissions_secure = match key {
      Some(_) => PlatformFilePermissions::has_secure_permissions(&self.key_path).ok(),
      None => None,
    };

    let record = if !self.store_path.exists() {
      RecordStatus::Missing
    } else {
      match self.read_stored()? {
        None => RecordStatus::Unreadable,
        Some(stored) if stored.encrypted_token.is_empty() => RecordStatus::NoToken {
          username: stored.username,
        },
        Some(stored) => match key.as_ref().map(|key| decode_token(&stored.encrypted_token, key)) {
          Some(Ok(_)) => RecordStatus::Readable {
            username: stored.username,
            email: stored.email,
          },
          _ => RecordStatus::Undecryptable {
            username: stored.username,
          },
        },
      }
    };

    debug!(?record, key_present = key.is_some(), "Vault status");
    Ok(VaultStatus {
      key_present: key.is_some(),
      key_well_formed,
      key_permissions_secure,
      record,
    })
  }
}

/// Directory holding `path`, for temporary files that must share its
/// filesystem.
fn parent_dir(path: &Path) -> &Path {
  match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  }
}

/// Flush a rename in `dir` to disk.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
  fs::File::open(dir)?.sync_all()
}

/// Directories cannot be opened for syncing here; the rename is left to the
/// filesystem.
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
  Ok(())
}

fn decode_token(encoded: &str, key: &Key) -> Result<SecretToken, CryptoError> {
  let blob = BASE64.decode(encoded).map_err(|_err| CryptoError::Encoding)?;
  decrypt(&blob, key)
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;

  fn vault_in(temp_dir: &TempDir) -> Vault {
    Vault::new(
      temp_dir.path().join("data/vault.key"),
      temp_dir.path().join("data/credentials.json"),
    )
  }

  fn record(token: Option<&str>) -> CredentialRecord {
    CredentialRecord {
      username: "octocat".to_string(),
      email: "octocat@example.com".to_string(),
      token: token.map(SecretToken::new),
    }
  }

  #[test]
  fn test_load_key_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let vault = vault_in(&temp_dir);

    let first = vault.load_key().unwrap();
    let second = vault.load_key().unwrap();

    assert_eq!(first, second);
    assert_eq!(first.as_bytes().len(), KEY_LEN);
    assert_eq!(fs::read(vault.key_path()).unwrap(), first.as_bytes());
  }

  #[test]
  #[cfg(unix)]
  fn test_key_and_record_are_owner_only() {
    let temp_dir = TempDir::new().unwrap();
    let vault = vault_in(&temp_dir);
    vault.save(&record(Some("ghp_token"))).unwrap();

    assert!(PlatformFilePermissions::has_secure_permissions(vault.key_path()).unwrap());
    assert!(PlatformFilePermissions::has_secure_permissions(vault.store_path()).unwrap());
  }

  #[test]
  fn test_save_then_load_round_trips() {
    let temp_dir = TempDir::new().unwrap();
    let vault = vault_in(&temp_dir);
    vault.save(&record(Some("ghp_round_trip"))).unwrap();

    let loaded = vault.load().unwrap().unwrap();
    assert_eq!(loaded, record(Some("ghp_round_trip")));
  }

  #[test]
  fn test_plaintext_token_never_written() {
    let temp_dir = TempDir::new().unwrap();
    let vault = vault_in(&temp_dir);
    vault.save(&record(Some("ghp_plaintext_marker"))).unwrap();

    let content = fs::read_to_string(vault.store_path()).unwrap();
    assert!(!content.contains("ghp_plaintext_marker"));
    assert!(content.contains("\"encrypted_token\""));
  }

  #[test]
  fn test_record_without_token_uses_empty_sentinel() {
    let temp_dir = TempDir::new().unwrap();
    let vault = vault_in(&temp_dir);
    vault.save(&record(None)).unwrap();

    let stored: serde_json::Value = serde_json::from_str(&fs::read_to_string(vault.store_path()).unwrap()).unwrap();
    assert_eq!(stored["encrypted_token"], "");

    let loaded = vault.load().unwrap().unwrap();
    assert!(loaded.token().is_none());
    assert_eq!(loaded.username, "octocat");
  }

  #[test]
  fn test_load_missing_record_is_absent() {
    let temp_dir = TempDir::new().unwrap();
    assert!(vault_in(&temp_dir).load().unwrap().is_none());
  }

  #[test]
  fn test_load_after_key_replacement_is_absent() {
    let temp_dir = TempDir::new().unwrap();
    let vault = vault_in(&temp_dir);
    vault.save(&record(Some("ghp_old_key"))).unwrap();

    fs::remove_file(vault.key_path()).unwrap();
    let regenerated = vault.load_key().unwrap();
    assert!(regenerated.is_well_formed());

    assert!(vault.load().unwrap().is_none());
  }

  #[test]
  fn test_load_corrupted_blob_is_absent() {
    let temp_dir = TempDir::new().unwrap();
    let vault = vault_in(&temp_dir);
    vault.load_key().unwrap();
    fs::write(
      vault.store_path(),
      r#"{"username":"u","email":"e","encrypted_token":"bm90LWEtcmVhbC1ibG9i"}"#,
    )
    .unwrap();

    assert!(vault.load().unwrap().is_none());
  }

  #[test]
  fn test_load_garbage_file_is_absent() {
    let temp_dir = TempDir::new().unwrap();
    let vault = vault_in(&temp_dir);
    fs::create_dir_all(vault.store_path().parent().unwrap()).unwrap();
    fs::write(vault.store_path(), "{ not json").unwrap();

    assert!(vault.load().unwrap().is_none());
  }

  #[test]
  fn test_legacy_token_field_is_read() {
    let temp_dir = TempDir::new().unwrap();
    let vault = vault_in(&temp_dir);
    let key = vault.load_key().unwrap();
    let encoded = BASE64.encode(encrypt("ghp_legacy", &key).unwrap());
    fs::write(
      vault.store_path(),
      format!(r#"{{"username":"u","email":"e","token":"{encoded}"}}"#),
    )
    .unwrap();

    let loaded = vault.load().unwrap().unwrap();
    assert_eq!(loaded.token().unwrap().expose(), "ghp_legacy");
  }

  #[test]
  fn test_save_overwrites_in_place() {
    let temp_dir = TempDir::new().unwrap();
    let vault = vault_in(&temp_dir);
    vault.save(&record(Some("ghp_first"))).unwrap();
    vault.save(&record(Some("ghp_second"))).unwrap();

    assert_eq!(vault.load().unwrap().unwrap().token().unwrap().expose(), "ghp_second");

    let leftovers: Vec<_> = fs::read_dir(vault.store_path().parent().unwrap())
      .unwrap()
      .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
      .collect();
    assert_eq!(leftovers.len(), 2, "unexpected files: {leftovers:?}");
  }

  #[test]
  fn test_save_with_malformed_key_fails_without_touching_record() {
    let temp_dir = TempDir::new().unwrap();
    let vault = vault_in(&temp_dir);
    vault.save(&record(Some("ghp_kept"))).unwrap();
    let before = fs::read(vault.store_path()).unwrap();

    fs::write(vault.key_path(), b"short").unwrap();
    let err = vault.save(&record(Some("ghp_new"))).unwrap_err();

    assert!(matches!(err, VaultError::MalformedKey { len: 5, .. }));
    assert_eq!(fs::read(vault.store_path()).unwrap(), before);
  }

  #[test]
  fn test_truncated_key_is_reported_by_path() {
    let temp_dir = TempDir::new().unwrap();
    let vault = vault_in(&temp_dir);
    vault.save(&record(Some("ghp_before_crash"))).unwrap();

    fs::write(vault.key_path(), b"").unwrap();

    assert!(vault.load().unwrap().is_none());
    let err = vault.save(&record(Some("ghp_after_crash"))).unwrap_err();
    let message = err.to_string();
    assert!(message.contains(&vault.key_path().display().to_string()), "{message}");
    assert!(message.contains("0 bytes"), "{message}");
    assert!(fs::read(vault.key_path()).unwrap().is_empty(), "key file must not be replaced");

    // Removing the key as the error suggests lets the next save succeed.
    fs::remove_file(vault.key_path()).unwrap();
    vault.save(&record(Some("ghp_after_crash"))).unwrap();
    assert_eq!(
      vault.load().unwrap().unwrap().token().unwrap().expose(),
      "ghp_after_crash"
    );
  }

  #[test]
  fn test_key_creation_leaves_only_the_key_file() {
    let temp_dir = TempDir::new().unwrap();
    let vault = vault_in(&temp_dir);
    vault.load_key().unwrap();

    let entries: Vec<_> = fs::read_dir(vault.key_path().parent().unwrap())
      .unwrap()
      .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
      .collect();
    assert_eq!(entries, ["vault.key"]);
    assert_eq!(fs::read(vault.key_path()).unwrap().len(), KEY_LEN);
  }

  #[test]
  fn test_create_key_keeps_a_key_written_concurrently() {
    let temp_dir = TempDir::new().unwrap();
    let vault = vault_in(&temp_dir);
    let winner = Key::generate();
    fs::create_dir_all(vault.key_path().parent().unwrap()).unwrap();
    fs::write(vault.key_path(), winner.as_bytes()).unwrap();

    let key = vault.create_key().unwrap();

    assert_eq!(key, winner);
    assert_eq!(fs::read(vault.key_path()).unwrap(), winner.as_bytes());
  }

  #[test]
  fn test_sync_dir_on_existing_directory() {
    let temp_dir = TempDir::new().unwrap();
    sync_dir(temp_dir.path()).unwrap();
    assert_eq!(parent_dir(Path::new("credentials.json")), Path::new("."));
  }

  #[test]
  fn test_clear_removes_record_but_keeps_key() {
    let temp_dir = TempDir::new().unwrap();
    let vault = vault_in(&temp_dir);
    vault.save(&record(Some("ghp_token"))).unwrap();

    assert!(vault.clear().unwrap());
    assert!(!vault.clear().unwrap());
    assert!(vault.key_path().exists());
    assert!(vault.load().unwrap().is_none());
  }

  #[test]
  fn test_status_reports_each_record_state() {
    let temp_dir = TempDir::new().unwrap();
    let vault = vault_in(&temp_dir);

    let status = vault.status().unwrap();
    assert!(!status.key_present);
    assert_eq!(status.key_well_formed, None);
    assert_eq!(status.record, RecordStatus::Missing);
    assert!(!vault.key_path().exists(), "status must not create the key");

    vault.save(&record(Some("ghp_token"))).unwrap();
    let status = vault.status().unwrap();
    assert!(status.key_present);
    assert_eq!(status.key_well_formed, Some(true));
    assert_eq!(
      status.record,
      RecordStatus::Readable {
        username: "octocat".to_string(),
        email: "octocat@example.com".to_string(),
      }
    );

    fs::write(vault.key_path(), b"").unwrap();
    let status = vault.status().unwrap();
    assert!(status.key_present);
    assert_eq!(status.key_well_formed, Some(false));
    assert_eq!(
      status.record,
      RecordStatus::Undecryptable {
        username: "octocat".to_string()
      }
    );

    fs::remove_file(vault.key_path()).unwrap();
    assert_eq!(
      vault.status().unwrap().record,
      RecordStatus::Undecryptable {
        username: "octocat".to_string()
      }
    );
  }
}
