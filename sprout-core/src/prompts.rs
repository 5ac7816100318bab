//! # Prompts Module
//!
//! The interactive input source consumed by the publisher, plus the dialoguer
//! theme used by every terminal prompt sprout renders.

use anyhow::Result;
use console::Style;
use dialoguer::theme::ColorfulTheme;

use crate::secret::SecretToken;

/// Returns a custom dialoguer theme matching sprout's color palette.
///
/// Features:
/// - Cyan bold prompt text
/// - Green `❯` prefix on active item
/// - Green highlight on active item text
pub fn sprout_theme() -> ColorfulTheme {
  ColorfulTheme {
    prompt_style: Style::new().cyan().bold(),
    active_item_prefix: Style::new().green().apply_to("❯ ".to_string()),
    active_item_style: Style::new().green(),
    ..ColorfulTheme::default()
  }
}

/// The committer identity stored next to the token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
  pub username: String,
  pub email: String,
}

/// Why the publisher is asking for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRequest {
  /// No usable token is stored yet.
  FirstUse,
  /// A push failed with the stored token and a replacement is needed.
  Replacement,
}

/// Source of interactive answers for credential capture.
///
/// Returning `None` from [`CredentialPrompt::token`] (or an empty token)
/// means the operator declined; the publisher then ends the attempt as
/// abandoned instead of blocking.
pub trait CredentialPrompt {
  /// Ask for the username and email, offering `current` as defaults.
  fn identity(&self, current: Option<&Identity>) -> Result<Identity>;

  /// Ask for an access token.
  fn token(&self, request: TokenRequest) -> Result<Option<SecretToken>>;

  /// Ask a yes/no question.
  fn confirm(&self, message: &str, default: bool) -> Result<bool>;
}
