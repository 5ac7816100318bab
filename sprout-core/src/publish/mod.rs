//! # Authenticated Remote Publisher
//!
//! Pushes a local repository to its remote with the stored access token,
//! capturing credentials on first use and offering exactly one
//! re-authentication retry when a push fails.
//!
//! One publish attempt walks these states:
//!
//! ```text
//! START -> LOAD_CREDENTIALS -> [PROMPT_TOKEN] -> REMOTE_BIND -> DETECT_UPSTREAM
//!       -> PUSH_TRACKED | PUSH_NEW -> DONE
//!                                  -> RETRY_ONCE -> PROMPT_TOKEN -> REMOTE_BIND -> ...
//!                                  -> FAILED
//! ```
//!
//! Binding always replaces the `origin` remote. A manually configured `origin`
//! is overwritten with the target URL.

pub mod failure;

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

pub use self::failure::{FailureClass, classify_push_failure};
use crate::config::PublishConfig;
use crate::consts::ORIGIN_REMOTE;
use crate::git::{CommandOutput, CommandRunner};
use crate::prompts::{CredentialPrompt, Identity, TokenRequest};
use crate::remote::{AuthenticatedUrl, RemoteUrl, RemoteUrlError};
use crate::secret::SecretToken;
use crate::vault::{CredentialRecord, Vault};

/// Upper bound on push invocations per publish attempt: the first push plus
/// one retry after re-authentication.
pub const MAX_PUSH_ATTEMPTS: u32 = 2;

/// States of a single publish attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
  Start,
  LoadCredentials,
  PromptToken,
  RemoteBind,
  DetectUpstream,
  PushTracked,
  PushNew,
  RetryOnce,
  Done,
  Failed,
}

impl PublishState {
  pub fn is_terminal(self) -> bool {
    matches!(self, PublishState::Done | PublishState::Failed)
  }
}

impl fmt::Display for PublishState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      PublishState::Start => "START",
      PublishState::LoadCredentials => "LOAD_CREDENTIALS",
      PublishState::PromptToken => "PROMPT_TOKEN",
      PublishState::RemoteBind => "REMOTE_BIND",
      PublishState::DetectUpstream => "DETECT_UPSTREAM",
      PublishState::PushTracked => "PUSH_TRACKED",
      PublishState::PushNew => "PUSH_NEW",
      PublishState::RetryOnce => "RETRY_ONCE",
      PublishState::Done => "DONE",
      PublishState::Failed => "FAILED",
    };
    f.write_str(name)
  }
}

/// A local repository and the plain remote URL it is published to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
  repo_path: PathBuf,
  remote_url: RemoteUrl,
}

impl RemoteTarget {
  pub fn new(repo_path: impl Into<PathBuf>, remote_url: RemoteUrl) -> Self {
    Self {
      repo_path: repo_path.into(),
      remote_url,
    }
  }

  /// Validate `remote_url` and pair it with `repo_path`.
  pub fn parse(repo_path: impl Into<PathBuf>, remote_url: &str) -> Result<Self, RemoteUrlError> {
    Ok(Self::new(repo_path, RemoteUrl::parse(remote_url)?))
  }

  pub fn repo_path(&self) -> &Path {
    &self.repo_path
  }

  pub fn remote_url(&self) -> &RemoteUrl {
    &self.remote_url
  }
}

/// Behavioural switches for the publisher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOptions {
  /// Store the token-bearing URL as `origin` instead of passing it to each
  /// push as a one-shot `remote.origin.pushurl` override.
  pub embed_token_in_origin: bool,
}

impl From<&PublishConfig> for PublishOptions {
  fn from(config: &PublishConfig) -> Self {
    Self {
      embed_token_in_origin: config.embed_token_in_origin,
    }
  }
}

/// Whether the current branch already tracks a branch on `origin`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamState {
  /// `origin/<branch>`
  Tracked(String),
  /// No upstream on `origin`. This is the normal state right after the
  /// remote was rebound, and also covers an upstream on another remote.
  Untracked,
}

/// Why a publish attempt ended in `FAILED`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
  /// The operator declined to provide a (replacement) token.
  UserAbandoned,
  /// Every allowed push attempt failed.
  PushRejected {
    class: FailureClass,
    attempts: u32,
    /// Redacted git output of the last attempt.
    detail: String,
  },
  /// A git step other than the push failed.
  StepFailed { step: &'static str, detail: String },
}

impl fmt::Display for FailureReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FailureReason::UserAbandoned => f.write_str("publishing abandoned: no token provided"),
      FailureReason::PushRejected { class, attempts, .. } => {
        let noun = if *attempts == 1 { "attempt" } else { "attempts" };
        write!(f, "push failed after {attempts} {noun}: {class}")
      }
      FailureReason::StepFailed { step, detail } if detail.is_empty() => write!(f, "failed to {step}"),
      FailureReason::StepFailed { step, detail } => write!(f, "failed to {step}: {detail}"),
    }
  }
}

/// Terminal outcome of a publish attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
  Done {
    branch: String,
    /// Whether the successful push also set the upstream (`-u`).
    set_upstream: bool,
  },
  Failed(FailureReason),
}

/// Result of a publish attempt with the counters needed to audit it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
  pub outcome: PublishOutcome,
  pub token_prompts: u32,
  pub push_attempts: u32,
  pub credential_writes: u32,
  /// Every state entered, in order, ending with `Done` or `Failed`.
  pub trace: Vec<PublishState>,
}

impl PublishReport {
  pub fn is_done(&self) -> bool {
    matches!(self.outcome, PublishOutcome::Done { .. })
  }

  pub fn failure(&self) -> Option<&FailureReason> {
    match &self.outcome {
      PublishOutcome::Failed(reason) => Some(reason),
      PublishOutcome::Done { .. } => None,
    }
  }
}

#[derive(Debug, Default)]
struct Progress {
  trace: Vec<PublishState>,
  token_prompts: u32,
  push_attempts: u32,
  credential_writes: u32,
}

impl Progress {
  fn enter(&mut self, state: PublishState) {
    debug!(%state, "Publish state");
    self.trace.push(state);
  }

  fn finish(mut self, outcome: PublishOutcome) -> PublishReport {
    match &outcome {
      PublishOutcome::Done { branch, .. } => {
        self.enter(PublishState::Done);
        info!(%branch, attempts = self.push_attempts, "Publish finished");
      }
      PublishOutcome::Failed(reason) => {
        self.enter(PublishState::Failed);
        warn!(%reason, attempts = self.push_attempts, "Publish failed");
      }
    }

    PublishReport {
      outcome,
      token_prompts: self.token_prompts,
      push_attempts: self.push_attempts,
      credential_writes: self.credential_writes,
      trace: self.trace,
    }
  }
}

/// Credentials resolved ahead of the push.
///
/// Produced by [`Publisher::prepare`] so a caller can use the identity (for
/// example to configure the committer) before anything is pushed.
#[derive(Debug)]
pub struct PreparedPublish {
  record: CredentialRecord,
  progress: Progress,
}

impl PreparedPublish {
  pub fn identity(&self) -> Identity {
    self.record.identity()
  }
}

/// Result of [`Publisher::prepare`]
#[derive(Debug)]
pub enum Prepared {
  Ready(PreparedPublish),
  /// The operator declined to enter a token on first use.
  Abandoned(PublishReport),
}

/// Why a bind/push cycle stopped before a push result was available.
enum Abort {
  Step(FailureReason),
  Error(anyhow::Error),
}

impl From<anyhow::Error> for Abort {
  fn from(err: anyhow::Error) -> Self {
    Abort::Error(err)
  }
}

enum Cycle {
  Pushed { branch: String, set_upstream: bool },
  PushFailed { class: FailureClass, detail: String },
}

/// Drives the publish state machine against a vault, a command runner and a
/// prompt source
pub struct Publisher<'a> {
  vault: &'a Vault,
  runner: &'a dyn CommandRunner,
  prompt: &'a dyn CredentialPrompt,
  options: PublishOptions,
}

impl<'a> Publisher<'a> {
  pub fn new(vault: &'a Vault, runner: &'a dyn CommandRunner, prompt: &'a dyn CredentialPrompt) -> Self {
    Self {
      vault,
      runner,
      prompt,
      options: PublishOptions::default(),
    }
  }

  pub fn with_options(mut self, options: PublishOptions) -> Self {
    self.options = options;
    self
  }

  pub fn runner(&self) -> &'a dyn CommandRunner {
    self.runner
  }

  pub fn prompt(&self) -> &'a dyn CredentialPrompt {
    self.prompt
  }

  /// Run a full publish attempt against `target`.
  ///
  /// A `FAILED` outcome is a normal return value. `Err` is reserved for
  /// vault I/O failures and for git not being runnable at all.
  pub fn publish(&self, target: &RemoteTarget) -> Result<PublishReport> {
    match self.prepare()? {
      Prepared::Ready(prepared) => self.finish(prepared, target),
      Prepared::Abandoned(report) => Ok(report),
    }
  }

  /// Load the stored credentials, capturing them interactively when no
  /// usable token is stored.
  pub fn prepare(&self) -> Result<Prepared> {
    let mut progress = Progress::default();
    progress.enter(PublishState::Start);
    progress.enter(PublishState::LoadCredentials);

    let stored = self.vault.load().context("Failed to load stored credentials")?;
    let record = match stored {
      Some(record) if record.token().is_some() => {
        debug!(username = %record.username, "Using stored credentials");
        record
      }
      other => {
        progress.enter(PublishState::PromptToken);
        let current = other.as_ref().map(CredentialRecord::identity);
        match self.capture_credentials(current.as_ref(), &mut progress)? {
          Some(record) => record,
          None => {
            return Ok(Prepared::Abandoned(
              progress.finish(PublishOutcome::Failed(FailureReason::UserAbandoned)),
            ));
          }
        }
      }
    };

    Ok(Prepared::Ready(PreparedPublish { record, progress }))
  }

  /// Bind, push and, if needed, retry once with a replacement token.
  pub fn finish(&self, prepared: PreparedPublish, target: &RemoteTarget) -> Result<PublishReport> {
    let PreparedPublish {
      mut record,
      mut progress,
    } = prepared;

    loop {
      let cycle = match record.token() {
        Some(token) => self.push_cycle(token, target, &mut progress),
        None => Err(Abort::Step(FailureReason::UserAbandoned)),
      };

      let (class, detail) = match cycle {
        Ok(Cycle::Pushed { branch, set_upstream }) => {
          return Ok(progress.finish(PublishOutcome::Done { branch, set_upstream }));
        }
        Ok(Cycle::PushFailed { class, detail }) => (class, detail),
        Err(Abort::Step(reason)) => return Ok(progress.finish(PublishOutcome::Failed(reason))),
        Err(Abort::Error(err)) => return Err(err),
      };

      warn!(%class, attempt = progress.push_attempts, "Push failed");
      if progress.push_attempts >= MAX_PUSH_ATTEMPTS {
        let attempts = progress.push_attempts;
        return Ok(progress.finish(PublishOutcome::Failed(FailureReason::PushRejected {
          class,
          attempts,
          detail,
        })));
      }

      progress.enter(PublishState::RetryOnce);
      if !self.replace_token(&mut record, class, &mut progress)? {
        return Ok(progress.finish(PublishOutcome::Failed(FailureReason::UserAbandoned)));
      }
    }
  }

  fn capture_credentials(
    &self,
    current: Option<&Identity>,
    progress: &mut Progress,
  ) -> Result<Option<CredentialRecord>> {
    let identity = self.prompt.identity(current).context("Failed to read identity")?;

    progress.token_prompts += 1;
    let Some(token) = self.ask_token(TokenRequest::FirstUse)? else {
      info!("No token entered, abandoning publish");
      return Ok(None);
    };

    let record = CredentialRecord::new(identity, Some(token));
    self.vault.save(&record).context("Failed to save credentials")?;
    progress.credential_writes += 1;
    Ok(Some(record))
  }

  /// Ask whether to retry and overwrite the stored token. Returns `false` when
  /// the operator declines, in which case nothing is written.
  fn replace_token(&self, record: &mut CredentialRecord, class: FailureClass, progress: &mut Progress) -> Result<bool> {
    let message = format!("Push failed ({class}). Enter a new token and retry?");
    if !self.prompt.confirm(&message, true).context("Failed to read confirmation")? {
      info!("Retry declined");
      return Ok(false);
    }

    progress.enter(PublishState::PromptToken);
    progress.token_prompts += 1;
    let Some(token) = self.ask_token(TokenRequest::Replacement)? else {
      info!("No replacement token entered");
      return Ok(false);
    };

    record.token = Some(token);
    self.vault.save(record).context("Failed to save replacement token")?;
    progress.credential_writes += 1;
    Ok(true)
  }

  fn ask_token(&self, request: TokenRequest) -> Result<Option<SecretToken>> {
    let token = self.prompt.token(request).context("Failed to read token")?;
    Ok(token.filter(|token| !token.is_empty()))
  }

  /// One REMOTE_BIND -> DETECT_UPSTREAM -> PUSH cycle. The authenticated URL
  /// lives only for the duration of this call.
  fn push_cycle(&self, token: &SecretToken, target: &RemoteTarget, progress: &mut Progress) -> Result<Cycle, Abort> {
    let repo = target.repo_path();

    progress.enter(PublishState::RemoteBind);
    let authenticated = target.remote_url().authenticate(token).map_err(|err| {
      Abort::Step(FailureReason::StepFailed {
        step: "build authenticated remote URL",
        detail: err.to_string(),
      })
    })?;
    self.bind_origin(repo, target.remote_url(), &authenticated)?;

    progress.enter(PublishState::DetectUpstream);
    let branch = self.current_branch(repo)?;
    let upstream = self.detect_upstream(repo)?;
    let set_upstream = upstream == UpstreamState::Untracked;
    progress.enter(if set_upstream {
      PublishState::PushNew
    } else {
      PublishState::PushTracked
    });

    let args = push_args(&authenticated, &branch, set_upstream, self.options);
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    progress.push_attempts += 1;
    let output = self.runner.run(repo, &arg_refs)?;

    if output.success() {
      info!(%branch, set_upstream, "Pushed to {}", target.remote_url());
      Ok(Cycle::Pushed { branch, set_upstream })
    } else {
      Ok(Cycle::PushFailed {
        class: classify_push_failure(&output.stderr),
        detail: output.combined(),
      })
    }
  }

  /// Point `origin` at the target, removing any existing `origin` first.
  fn bind_origin(&self, repo: &Path, remote_url: &RemoteUrl, authenticated: &AuthenticatedUrl) -> Result<(), Abort> {
    let remotes = self.run_step(repo, "list remotes", &["remote"])?;
    if remotes.stdout.lines().any(|line| line.trim() == ORIGIN_REMOTE) {
      self.run_step(repo, "remove the origin remote", &["remote", "remove", ORIGIN_REMOTE])?;
    }

    let bound_url = if self.options.embed_token_in_origin {
      authenticated.expose()
    } else {
      remote_url.as_str()
    };
    self.run_step(repo, "add the origin remote", &["remote", "add", ORIGIN_REMOTE, bound_url])?;

    info!(embedded = self.options.embed_token_in_origin, "Bound {ORIGIN_REMOTE} to {remote_url}");
    Ok(())
  }

  fn current_branch(&self, repo: &Path) -> Result<String, Abort> {
    let output = self.run_step(
      repo,
      "determine the current branch",
      &["symbolic-ref", "--quiet", "--short", "HEAD"],
    )?;
    let branch = output.stdout.trim();
    if branch.is_empty() {
      return Err(Abort::Step(FailureReason::StepFailed {
        step: "determine the current branch",
        detail: "HEAD does not point at a branch".to_string(),
      }));
    }
    Ok(branch.to_string())
  }

  fn detect_upstream(&self, repo: &Path) -> Result<UpstreamState, Abort> {
    let output = self
      .runner
      .run(repo, &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"])?;
    let state = upstream_state(&output);
    debug!(?state, "Detected upstream");
    Ok(state)
  }

  fn run_step(&self, repo: &Path, step: &'static str, args: &[&str]) -> Result<CommandOutput, Abort> {
    let output = self.runner.run(repo, args)?;
    if output.success() {
      Ok(output)
    } else {
      Err(Abort::Step(FailureReason::StepFailed {
        step,
        detail: output.combined(),
      }))
    }
  }
}

/// Interpret `git rev-parse @{u}`. Only an upstream on `origin` counts as
/// tracked; any other remote would receive the push instead of the target.
fn upstream_state(output: &CommandOutput) -> UpstreamState {
  let upstream = output.stdout.trim();
  match upstream.strip_prefix(ORIGIN_REMOTE).and_then(|rest| rest.strip_prefix('/')) {
    Some(branch) if output.success() && !branch.is_empty() => UpstreamState::Tracked(upstream.to_string()),
    _ => UpstreamState::Untracked,
  }
}

/// Arguments for the push. The token appears only in the authenticated URL
/// override, which is absent when `origin` already carries it.
fn push_args(
  authenticated: &AuthenticatedUrl,
  branch: &str,
  set_upstream: bool,
  options: PublishOptions,
) -> Zeroizing<Vec<String>> {
  let mut args = Zeroizing::new(Vec::with_capacity(6));
  if !options.embed_token_in_origin {
    args.push("-c".to_string());
    args.push(format!("remote.{ORIGIN_REMOTE}.pushurl={}", authenticated.expose()));
  }
  args.push("push".to_string());
  if set_upstream {
    args.push("-u".to_string());
    args.push(ORIGIN_REMOTE.to_string());
    args.push(branch.to_string());
  }
  args
}
