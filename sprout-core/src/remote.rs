//! # Remote URLs
//!
//! Validation of the plain (secret-free) remote URL supplied by the caller and
//! derivation of the short-lived authenticated URL used for a push.

use std::fmt;

use thiserror::Error;
use url::Url;
use zeroize::Zeroizing;

use crate::consts::REDACTED;
use crate::secret::SecretToken;

/// Errors raised while validating or authenticating a remote URL
#[derive(Debug, Error)]
pub enum RemoteUrlError {
  #[error("'{url}' is not a valid URL: {source}")]
  Invalid {
    url: String,
    #[source]
    source: url::ParseError,
  },

  #[error("unsupported remote scheme '{0}', only http and https remotes can carry a token")]
  UnsupportedScheme(String),

  #[error("remote URL has no host")]
  MissingHost,

  #[error("remote URL already embeds credentials; pass the plain URL instead")]
  EmbeddedCredentials,

  #[error("the token cannot be placed in this remote URL")]
  CannotAuthenticate,
}

/// A validated `http(s)` remote URL without credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl(Url);

impl RemoteUrl {
  /// Parse and validate a remote URL.
  pub fn parse(raw: &str) -> Result<Self, RemoteUrlError> {
    let url = Url::parse(raw.trim()).map_err(|source| RemoteUrlError::Invalid {
      url: redact_credentials(raw.trim()),
      source,
    })?;

    match url.scheme() {
      "https" | "http" => {}
      other => return Err(RemoteUrlError::UnsupportedScheme(other.to_string())),
    }

    if url.host_str().is_none_or(str::is_empty) {
      return Err(RemoteUrlError::MissingHost);
    }

    if !url.username().is_empty() || url.password().is_some() {
      return Err(RemoteUrlError::EmbeddedCredentials);
    }

    Ok(Self(url))
  }

  pub fn as_str(&self) -> &str {
    self.0.as_str()
  }

  pub fn host(&self) -> &str {
    self.0.host_str().unwrap_or_default()
  }

  /// Inject `token` as the basic-auth user segment.
  pub fn authenticate(&self, token: &SecretToken) -> Result<AuthenticatedUrl, RemoteUrlError> {
    let mut url = self.0.clone();
    url
      .set_username(token.expose())
      .map_err(|()| RemoteUrlError::CannotAuthenticate)?;
    Ok(AuthenticatedUrl(Zeroizing::new(String::from(url))))
  }
}

impl fmt::Display for RemoteUrl {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A remote URL carrying the access token.
///
/// Only [`AuthenticatedUrl::expose`] yields the real value; `Debug` and
/// `Display` show the redacted form, and the buffer is wiped on drop.
pub struct AuthenticatedUrl(Zeroizing<String>);

impl AuthenticatedUrl {
  pub fn expose(&self) -> &str {
    self.0.as_str()
  }
}

impl fmt::Debug for AuthenticatedUrl {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "AuthenticatedUrl({})", redact_credentials(self.expose()))
  }
}

impl fmt::Display for AuthenticatedUrl {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&redact_credentials(self.expose()))
  }
}

/// Replace the user-info part of every `scheme://user@host` occurrence in
/// `text` with a placeholder.
pub fn redact_credentials(text: &str) -> String {
  let mut redacted = String::with_capacity(text.len());
  let mut rest = text;

  while let Some(idx) = rest.find("://") {
    let (head, tail) = rest.split_at(idx + 3);
    redacted.push_str(head);

    let authority_end = tail
      .find(|c: char| c == '/' || c == '\'' || c == '"' || c.is_whitespace())
      .unwrap_or(tail.len());
    let authority = &tail[..authority_end];

    match authority.rfind('@') {
      Some(at) => {
        redacted.push_str(REDACTED);
        redacted.push_str(&authority[at..]);
      }
      None => redacted.push_str(authority),
    }

    rest = &tail[authority_end..];
  }

  redacted.push_str(rest);
  redacted
}
