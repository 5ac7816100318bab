//! Classification of failed push output.
//!
//! The class only shapes what the operator is told. Every failed push gets the
//! same single re-authentication retry regardless of how it was classified.

use std::fmt;

/// Best-effort reading of why a push failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
  /// The remote refused the token or the user behind it.
  Authentication,
  /// The remote accepted the credentials but refused the update.
  Rejected,
  /// The remote could not be reached.
  Network,
  Other,
}

impl FailureClass {
  pub fn describe(self) -> &'static str {
    match self {
      FailureClass::Authentication => "authentication failed",
      FailureClass::Rejected => "push rejected by remote",
      FailureClass::Network => "remote unreachable",
      FailureClass::Other => "unknown failure",
    }
  }

  /// Hint shown to the operator after the final failure.
  pub fn hint(self) -> &'static str {
    match self {
      FailureClass::Authentication => "Check that the token is valid and has write access to the repository.",
      FailureClass::Rejected => "The remote has commits you do not have locally. Pull or rebase before publishing.",
      FailureClass::Network => "Check your network connection and the remote URL.",
      FailureClass::Other => "Re-run with -vv to see the git commands that were executed.",
    }
  }
}

impl fmt::Display for FailureClass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.describe())
  }
}

const AUTHENTICATION_MARKERS: &[&str] = &[
  "authentication failed",
  "invalid username or password",
  "could not read username",
  "could not read password",
  "terminal prompts disabled",
  "bad credentials",
  "permission to",
  "denied to",
  "repository not found",
  "returned error: 401",
  "returned error: 403",
  " 401 ",
  " 403 ",
];

const NETWORK_MARKERS: &[&str] = &[
  "could not resolve host",
  "connection timed out",
  "operation timed out",
  "failed to connect",
  "connection refused",
  "network is unreachable",
  "ssl certificate problem",
  "ssl_connect",
  "gnutls_handshake",
];

const REJECTED_MARKERS: &[&str] = &["[rejected]", "non-fast-forward", "fetch first", "failed to push some refs"];

/// Classify the stderr of a failed push.
///
/// Authentication markers win over the others: git often prints a generic
/// "failed to push some refs" line after the real cause.
pub fn classify_push_failure(stderr: &str) -> FailureClass {
  let lowered = stderr.to_lowercase();
  let matches = |markers: &[&str]| markers.iter().any(|marker| lowered.contains(marker));

  if matches(AUTHENTICATION_MARKERS) {
    FailureClass::Authentication
  } else if matches(NETWORK_MARKERS) {
    FailureClass::Network
  } else if matches(REJECTED_MARKERS) {
    FailureClass::Rejected
  } else {
    FailureClass::Other
  }
}
