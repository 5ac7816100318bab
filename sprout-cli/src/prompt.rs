//! Terminal implementation of the credential prompt.

use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Password};
use sprout_core::prompts::sprout_theme;
use sprout_core::{CredentialPrompt, Identity, SecretToken, TokenRequest};

/// [`CredentialPrompt`] backed by dialoguer widgets on the controlling
/// terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerPrompt;

impl DialoguerPrompt {
  pub fn new() -> Self {
    Self
  }
}

fn ask_required(prompt: &str, current: Option<&str>) -> Result<String> {
  let theme = sprout_theme();
  let mut input = Input::<String>::with_theme(&theme)
    .with_prompt(prompt)
    .validate_with(|value: &String| -> Result<(), &str> {
      if value.trim().is_empty() {
        Err("A value is required")
      } else {
        Ok(())
      }
    });
  if let Some(current) = current.filter(|value| !value.is_empty()) {
    input = input.default(current.to_string());
  }

  let value = input
    .interact_text()
    .with_context(|| format!("Failed to read {}", prompt.to_lowercase()))?;
  Ok(value.trim().to_string())
}

impl CredentialPrompt for DialoguerPrompt {
  fn identity(&self, current: Option<&Identity>) -> Result<Identity> {
    let username = ask_required("Username", current.map(|identity| identity.username.as_str()))?;
    let email = ask_required("Email", current.map(|identity| identity.email.as_str()))?;
    Ok(Identity { username, email })
  }

  fn token(&self, request: TokenRequest) -> Result<Option<SecretToken>> {
    let prompt = match request {
      TokenRequest::FirstUse => "Access token (leave empty to cancel)",
      TokenRequest::Replacement => "New access token (leave empty to cancel)",
    };

    let raw = Password::with_theme(&sprout_theme())
      .with_prompt(prompt)
      .allow_empty_password(true)
      .interact()
      .context("Failed to read access token")?;

    let token = SecretToken::from_input(raw);
    Ok((!token.is_empty()).then_some(token))
  }

  fn confirm(&self, message: &str, default: bool) -> Result<bool> {
    Confirm::with_theme(&sprout_theme())
      .with_prompt(message)
      .default(default)
      .interact()
      .context("Failed to read confirmation")
  }
}
