//! A scripted [`CredentialPrompt`] with queued answers.
//!
//! Running out of answers is an error, so a test fails loudly when the code
//! under test asks one question more than expected.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use anyhow::{Result, anyhow};
use sprout_core::{CredentialPrompt, Identity, SecretToken, TokenRequest};

pub struct ScriptedPrompt {
  identity: Identity,
  tokens: RefCell<VecDeque<Option<String>>>,
  confirms: RefCell<VecDeque<bool>>,
  identity_prompts: Cell<u32>,
  token_requests: RefCell<Vec<TokenRequest>>,
  confirm_messages: RefCell<Vec<String>>,
}

impl Default for ScriptedPrompt {
  fn default() -> Self {
    Self::new()
  }
}

impl ScriptedPrompt {
  pub fn new() -> Self {
    Self {
      identity: Identity {
        username: "octocat".to_string(),
        email: "octocat@example.com".to_string(),
      },
      tokens: RefCell::default(),
      confirms: RefCell::default(),
      identity_prompts: Cell::new(0),
      token_requests: RefCell::default(),
      confirm_messages: RefCell::default(),
    }
  }

  pub fn with_identity(mut self, username: &str, email: &str) -> Self {
    self.identity = Identity {
      username: username.to_string(),
      email: email.to_string(),
    };
    self
  }

  /// Queue a token answer
  pub fn with_token(self, token: &str) -> Self {
    self.tokens.borrow_mut().push_back(Some(token.to_string()));
    self
  }

  /// Queue a skipped token prompt
  pub fn with_no_token(self) -> Self {
    self.tokens.borrow_mut().push_back(None);
    self
  }

  /// Queue a yes/no answer
  pub fn with_confirm(self, answer: bool) -> Self {
    self.confirms.borrow_mut().push_back(answer);
    self
  }

  pub fn identity_prompts(&self) -> u32 {
    self.identity_prompts.get()
  }

  /// Every token request, in order
  pub fn token_requests(&self) -> Vec<TokenRequest> {
    self.token_requests.borrow().clone()
  }

  pub fn confirm_messages(&self) -> Vec<String> {
    self.confirm_messages.borrow().clone()
  }

  /// Whether every queued answer was consumed
  pub fn exhausted(&self) -> bool {
    self.tokens.borrow().is_empty() && self.confirms.borrow().is_empty()
  }
}

impl CredentialPrompt for ScriptedPrompt {
  fn identity(&self, current: Option<&Identity>) -> Result<Identity> {
    self.identity_prompts.set(self.identity_prompts.get() + 1);
    Ok(current.cloned().unwrap_or_else(|| self.identity.clone()))
  }

  fn token(&self, request: TokenRequest) -> Result<Option<SecretToken>> {
    self.token_requests.borrow_mut().push(request);
    let answer = self
      .tokens
      .borrow_mut()
      .pop_front()
      .ok_or_else(|| anyhow!("unexpected token prompt ({request:?})"))?;
    Ok(answer.map(SecretToken::from_input))
  }

  fn confirm(&self, message: &str, _default: bool) -> Result<bool> {
    self.confirm_messages.borrow_mut().push(message.to_string());
    self
      .confirms
      .borrow_mut()
      .pop_front()
      .ok_or_else(|| anyhow!("unexpected confirmation: {message}"))
  }
}
