//! Wrapper for the remote access token while it is held in plaintext.

use std::fmt;

use zeroize::Zeroizing;

use crate::consts::REDACTED;

/// A plaintext access token.
///
/// The buffer is wiped when the value is dropped and the token never shows up
/// in `Debug` output, so records holding one can be logged safely.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretToken(Zeroizing<String>);

impl SecretToken {
  pub fn new(token: impl Into<String>) -> Self {
    Self(Zeroizing::new(token.into()))
  }

  /// Wrap a token typed by the operator, dropping surrounding whitespace.
  pub fn from_input(input: impl Into<String>) -> Self {
    let raw = Zeroizing::new(input.into());
    let trimmed = raw.trim();
    if trimmed.len() == raw.len() {
      Self(raw)
    } else {
      Self(Zeroizing::new(trimmed.to_string()))
    }
  }

  /// Borrow the plaintext token.
  pub fn expose(&self) -> &str {
    self.0.as_str()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl fmt::Debug for SecretToken {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "SecretToken({REDACTED})")
  }
}
