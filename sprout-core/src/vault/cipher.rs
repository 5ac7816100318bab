//! Symmetric encryption of the access token.
//!
//! Tokens are sealed with XChaCha20-Poly1305 under a fresh random nonce.
//! The blob layout is `version (1) || nonce (24) || ciphertext || tag (16)`,
//! with the version byte bound in as associated data.

use std::fmt;

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use crate::consts::REDACTED;
use crate::secret::SecretToken;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
const BLOB_VERSION: u8 = 1;

/// Errors from encrypting or decrypting a token
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
  #[error("key material must be {expected} bytes, found {0}", expected = KEY_LEN)]
  MalformedKey(usize),

  #[error("encrypted token is truncated")]
  Truncated,

  #[error("encrypted token uses unsupported format version {0}")]
  UnsupportedVersion(u8),

  #[error("encrypted token failed authentication (wrong key or corrupted data)")]
  Authentication,

  #[error("encrypted token is not valid base64")]
  Encoding,

  #[error("decrypted token is not valid UTF-8")]
  InvalidUtf8,

  #[error("token encryption failed")]
  Encryption,
}

/// Symmetric key material.
#[derive(Clone, PartialEq, Eq)]
pub struct Key(Zeroizing<Vec<u8>>);

impl Key {
  /// Generate fresh key material from the OS random number generator.
  pub fn generate() -> Self {
    let mut bytes = Zeroizing::new(vec![0u8; KEY_LEN]);
    OsRng.fill_bytes(&mut bytes);
    Self(bytes)
  }

  /// Wrap raw bytes read from the key file. Length is checked on use.
  pub fn from_bytes(bytes: Vec<u8>) -> Self {
    Self(Zeroizing::new(bytes))
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }

  pub fn is_well_formed(&self) -> bool {
    self.0.len() == KEY_LEN
  }
}

impl fmt::Debug for Key {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Key({REDACTED}, {} bytes)", self.0.len())
  }
}

fn cipher_for(key: &Key) -> Result<XChaCha20Poly1305, CryptoError> {
  XChaCha20Poly1305::new_from_slice(key.as_bytes()).map_err(|_err| CryptoError::MalformedKey(key.as_bytes().len()))
}

/// Encrypt `token` under `key`.
pub fn encrypt(token: &str, key: &Key) -> Result<Vec<u8>, CryptoError> {
  let cipher = cipher_for(key)?;

  let mut nonce = [0u8; NONCE_LEN];
  OsRng.fill_bytes(&mut nonce);

  let ciphertext = cipher
    .encrypt(
      XNonce::from_slice(&nonce),
      Payload {
        msg: token.as_bytes(),
        aad: &[BLOB_VERSION],
      },
    )
    .map_err(|_err| CryptoError::Encryption)?;

  let mut blob = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
  blob.push(BLOB_VERSION);
  blob.extend_from_slice(&nonce);
  blob.extend_from_slice(&ciphertext);
  Ok(blob)
}

/// Decrypt a blob produced by [`encrypt`] under the same key.
///
/// Any mismatch (other key, truncation, a flipped byte anywhere) is an error;
/// a wrong plaintext is never returned.
pub fn decrypt(blob: &[u8], key: &Key) -> Result<SecretToken, CryptoError> {
  let cipher = cipher_for(key)?;

  let Some((&version, rest)) = blob.split_first() else {
    return Err(CryptoError::Truncated);
  };
  if version != BLOB_VERSION {
    return Err(CryptoError::UnsupportedVersion(version));
  }
  if rest.len() < NONCE_LEN + TAG_LEN {
    return Err(CryptoError::Truncated);
  }

  let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
  let plaintext = cipher
    .decrypt(
      XNonce::from_slice(nonce),
      Payload {
        msg: ciphertext,
        aad: &[BLOB_VERSION],
      },
    )
    .map_err(|_err| CryptoError::Authentication)?;

  match String::from_utf8(plaintext) {
    Ok(token) => Ok(SecretToken::new(token)),
    Err(err) => {
      err.into_bytes().zeroize();
      Err(CryptoError::InvalidUtf8)
    }
  }
}
