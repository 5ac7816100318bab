use std::fs;
use std::path::Path;

use sprout_core::publish::{
  FailureClass, FailureReason, MAX_PUSH_ATTEMPTS, PublishOptions, PublishOutcome, PublishState,
};
use sprout_core::{CommandOutput, CredentialRecord, Publisher, RemoteTarget, SecretToken, TokenRequest, Vault};
use sprout_test_utils::{ScriptedPrompt, ScriptedRunner};
use tempfile::TempDir;

const REMOTE: &str = "https://github.com/octo/hello.git";
const AUTH_FAILURE: &str =
  "remote: Invalid username or password.\nfatal: Authentication failed for 'https://github.com/octo/hello.git/'\n";

struct Fixture {
  _store_dir: TempDir,
  repo_dir: TempDir,
  vault: Vault,
}

impl Fixture {
  fn new() -> Self {
    let store_dir = TempDir::new().unwrap();
    let vault = Vault::new(
      store_dir.path().join("vault.key"),
      store_dir.path().join("credentials.json"),
    );
    Self {
      _store_dir: store_dir,
      repo_dir: TempDir::new().unwrap(),
      vault,
    }
  }

  fn with_stored_token(token: &str) -> Self {
    let fixture = Self::new();
    fixture
      .vault
      .save(&CredentialRecord {
        username: "octocat".to_string(),
        email: "octocat@example.com".to_string(),
        token: Some(SecretToken::new(token)),
      })
      .unwrap();
    fixture
  }

  fn target(&self) -> RemoteTarget {
    RemoteTarget::parse(self.repo_dir.path(), REMOTE).unwrap()
  }

  fn stored_token(&self) -> Option<String> {
    self
      .vault
      .load()
      .unwrap()
      .and_then(|record| record.token().map(|token| token.expose().to_string()))
  }

  fn store_bytes(&self) -> Vec<u8> {
    fs::read(self.vault.store_path()).unwrap()
  }
}

fn pushurl_token(args: &[String]) -> Option<&str> {
  args
    .iter()
    .find_map(|arg| arg.strip_prefix("remote.origin.pushurl=https://"))
    .and_then(|rest| rest.split('@').next())
}

#[test]
fn test_fresh_repository_first_use_publishes_with_one_prompt() {
  let fixture = Fixture::new();
  let runner = ScriptedRunner::untracked_branch("main");
  let prompt = ScriptedPrompt::new().with_token("ghp_valid");

  let report = Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap();

  assert_eq!(
    report.outcome,
    PublishOutcome::Done {
      branch: "main".to_string(),
      set_upstream: true,
    }
  );
  assert_eq!(report.token_prompts, 1);
  assert_eq!(report.push_attempts, 1);
  assert_eq!(report.credential_writes, 1);
  assert_eq!(
    report.trace,
    [
      PublishState::Start,
      PublishState::LoadCredentials,
      PublishState::PromptToken,
      PublishState::RemoteBind,
      PublishState::DetectUpstream,
      PublishState::PushNew,
      PublishState::Done,
    ]
  );

  assert_eq!(prompt.token_requests(), [TokenRequest::FirstUse]);
  assert_eq!(prompt.identity_prompts(), 1);
  assert_eq!(fixture.stored_token().as_deref(), Some("ghp_valid"));

  let pushes = runner.pushes();
  assert_eq!(pushes.len(), 1);
  assert_eq!(pushes[0].command(), ["push", "-u", "origin", "main"]);
  assert_eq!(pushurl_token(&pushes[0].args), Some("ghp_valid"));
  assert_eq!(pushes[0].repo_path, fixture.repo_dir.path());
}

#[test]
fn test_stored_token_is_used_without_prompting() {
  let fixture = Fixture::with_stored_token("ghp_stored");
  let runner = ScriptedRunner::tracked_branch("main");
  let prompt = ScriptedPrompt::new();

  let report = Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap();

  assert!(report.is_done());
  assert_eq!(report.token_prompts, 0);
  assert_eq!(report.credential_writes, 0);
  assert!(report.trace.contains(&PublishState::PushTracked));
  assert!(!report.trace.contains(&PublishState::PromptToken));
  assert_eq!(prompt.identity_prompts(), 0);

  let pushes = runner.pushes();
  assert_eq!(pushes.len(), 1);
  assert_eq!(pushes[0].command(), ["push"]);
  assert_eq!(pushurl_token(&pushes[0].args), Some("ghp_stored"));
}

#[test]
fn test_upstream_on_another_remote_pushes_to_origin() {
  let fixture = Fixture::with_stored_token("ghp_stored");
  let runner =
    ScriptedRunner::untracked_branch("main").on(&["rev-parse", "--abbrev-ref"], CommandOutput::ok("upstream/main\n"));
  let prompt = ScriptedPrompt::new();

  let report = Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap();

  assert_eq!(
    report.outcome,
    PublishOutcome::Done {
      branch: "main".to_string(),
      set_upstream: true,
    }
  );
  assert!(report.trace.contains(&PublishState::PushNew));
  assert!(!report.trace.contains(&PublishState::PushTracked));

  let pushes = runner.pushes();
  assert_eq!(pushes.len(), 1);
  assert_eq!(pushes[0].command(), ["push", "-u", "origin", "main"]);
  assert_eq!(pushurl_token(&pushes[0].args), Some("ghp_stored"));
}

#[test]
fn test_untracked_branch_sets_upstream_exactly_once() {
  let fixture = Fixture::with_stored_token("ghp_stored");
  let runner = ScriptedRunner::untracked_branch("develop");
  let prompt = ScriptedPrompt::new();

  let report = Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap();

  assert!(report.is_done());
  let upstream_pushes: Vec<_> = runner
    .pushes()
    .into_iter()
    .filter(|call| call.command().iter().any(|arg| arg == "-u"))
    .collect();
  assert_eq!(upstream_pushes.len(), 1);
  assert_eq!(upstream_pushes[0].command(), ["push", "-u", "origin", "develop"]);
}

#[test]
fn test_stale_token_replaced_and_retried() {
  let fixture = Fixture::with_stored_token("ghp_stale");
  let runner = ScriptedRunner::untracked_branch("main").on_sequence(
    &["push"],
    vec![CommandOutput::failed(128, AUTH_FAILURE), CommandOutput::ok("")],
  );
  let prompt = ScriptedPrompt::new().with_confirm(true).with_token("ghp_fresh");

  let report = Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap();

  assert!(report.is_done());
  assert_eq!(report.push_attempts, 2);
  assert_eq!(report.credential_writes, 1);
  assert_eq!(report.token_prompts, 1);
  assert_eq!(prompt.token_requests(), [TokenRequest::Replacement]);
  assert!(prompt.confirm_messages()[0].contains("authentication failed"));
  assert_eq!(fixture.stored_token().as_deref(), Some("ghp_fresh"));

  let pushes = runner.pushes();
  assert_eq!(pushurl_token(&pushes[0].args), Some("ghp_stale"));
  assert_eq!(pushurl_token(&pushes[1].args), Some("ghp_fresh"));

  // origin is rebound before every attempt
  assert_eq!(runner.calls_matching(&["remote", "add"]).len(), 2);

  let retry = report
    .trace
    .iter()
    .position(|state| *state == PublishState::RetryOnce)
    .unwrap();
  assert_eq!(
    report.trace[retry..retry + 3],
    [PublishState::RetryOnce, PublishState::PromptToken, PublishState::RemoteBind]
  );
}

#[test]
fn test_declining_retry_abandons_without_overwrite() {
  let fixture = Fixture::with_stored_token("ghp_stale");
  let before = fixture.store_bytes();
  let runner = ScriptedRunner::untracked_branch("main").on(&["push"], CommandOutput::failed(128, AUTH_FAILURE));
  let prompt = ScriptedPrompt::new().with_confirm(false);

  let report = Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap();

  assert_eq!(report.outcome, PublishOutcome::Failed(FailureReason::UserAbandoned));
  assert_eq!(report.push_attempts, 1);
  assert_eq!(report.credential_writes, 0);
  assert_eq!(runner.pushes().len(), 1);
  assert!(prompt.token_requests().is_empty());
  assert_eq!(fixture.store_bytes(), before);
  assert_eq!(report.trace.last(), Some(&PublishState::Failed));
}

#[test]
fn test_skipping_replacement_token_abandons_without_overwrite() {
  let fixture = Fixture::with_stored_token("ghp_stale");
  let before = fixture.store_bytes();
  let runner = ScriptedRunner::untracked_branch("main").on(&["push"], CommandOutput::failed(128, AUTH_FAILURE));
  let prompt = ScriptedPrompt::new().with_confirm(true).with_no_token();

  let report = Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap();

  assert_eq!(report.failure(), Some(&FailureReason::UserAbandoned));
  assert_eq!(report.push_attempts, 1);
  assert_eq!(report.token_prompts, 1);
  assert_eq!(fixture.store_bytes(), before);
  assert_eq!(fixture.stored_token().as_deref(), Some("ghp_stale"));
}

#[test]
fn test_always_failing_push_stops_after_two_attempts() {
  let fixture = Fixture::with_stored_token("ghp_stale");
  let runner = ScriptedRunner::untracked_branch("main").on(&["push"], CommandOutput::failed(128, AUTH_FAILURE));
  let prompt = ScriptedPrompt::new().with_confirm(true).with_token("ghp_also_bad");

  let report = Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap();

  match report.failure() {
    Some(FailureReason::PushRejected { class, attempts, detail }) => {
      assert_eq!(*class, FailureClass::Authentication);
      assert_eq!(*attempts, MAX_PUSH_ATTEMPTS);
      assert!(detail.contains("Authentication failed"));
    }
    other => panic!("expected push rejection, got {other:?}"),
  }
  assert_eq!(runner.pushes().len(), 2);
  assert_eq!(report.credential_writes, 1);
  assert!(prompt.exhausted());
}

#[test]
fn test_rejected_push_gets_the_same_single_retry() {
  let fixture = Fixture::with_stored_token("ghp_valid");
  let runner = ScriptedRunner::untracked_branch("main").on(
    &["push"],
    CommandOutput::failed(1, " ! [rejected]        main -> main (fetch first)\nerror: failed to push some refs\n"),
  );
  let prompt = ScriptedPrompt::new().with_confirm(true).with_token("ghp_valid_again");

  let report = Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap();

  assert!(matches!(
    report.failure(),
    Some(FailureReason::PushRejected {
      class: FailureClass::Rejected,
      attempts: 2,
      ..
    })
  ));
  assert!(prompt.confirm_messages()[0].contains("push rejected by remote"));
}

#[test]
fn test_empty_first_use_token_abandons_before_any_git_call() {
  let fixture = Fixture::new();
  let runner = ScriptedRunner::untracked_branch("main");
  let prompt = ScriptedPrompt::new().with_token("   ");

  let report = Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap();

  assert_eq!(report.failure(), Some(&FailureReason::UserAbandoned));
  assert_eq!(report.credential_writes, 0);
  assert!(runner.calls().is_empty());
  assert!(!fixture.vault.store_path().exists());
}

#[test]
fn test_existing_origin_is_replaced() {
  let fixture = Fixture::with_stored_token("ghp_stored");
  let runner = ScriptedRunner::untracked_branch("main").on(&["remote"], CommandOutput::ok("origin\nupstream\n"));
  let prompt = ScriptedPrompt::new();

  Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap();

  let commands: Vec<Vec<String>> = runner
    .calls_matching(&["remote"])
    .iter()
    .map(|call| call.command().to_vec())
    .collect();
  assert_eq!(
    commands,
    [
      vec!["remote".to_string()],
      vec!["remote".to_string(), "remove".to_string(), "origin".to_string()],
      vec![
        "remote".to_string(),
        "add".to_string(),
        "origin".to_string(),
        REMOTE.to_string()
      ],
    ]
  );
}

#[test]
fn test_missing_origin_is_not_removed() {
  let fixture = Fixture::with_stored_token("ghp_stored");
  let runner = ScriptedRunner::untracked_branch("main").on(&["remote"], CommandOutput::ok("upstream\n"));
  let prompt = ScriptedPrompt::new();

  let report = Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap();

  assert!(report.is_done());
  assert!(runner.calls_matching(&["remote", "remove"]).is_empty());
}

#[test]
fn test_token_only_appears_in_push_override_by_default() {
  let fixture = Fixture::with_stored_token("ghp_secret_marker");
  let runner = ScriptedRunner::untracked_branch("main");
  let prompt = ScriptedPrompt::new();

  Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap();

  for call in runner.calls() {
    for arg in &call.args {
      if arg.contains("ghp_secret_marker") {
        assert!(
          arg.starts_with("remote.origin.pushurl=") && call.starts_with(&["push"]),
          "token leaked into {:?}",
          call.command()
        );
      }
    }
  }

  let add = &runner.calls_matching(&["remote", "add"])[0];
  assert_eq!(add.command().last().map(String::as_str), Some(REMOTE));
}

#[test]
fn test_embed_mode_binds_origin_to_authenticated_url() {
  let fixture = Fixture::with_stored_token("ghp_embedded");
  let runner = ScriptedRunner::untracked_branch("main");
  let prompt = ScriptedPrompt::new();

  let report = Publisher::new(&fixture.vault, &runner, &prompt)
    .with_options(PublishOptions {
      embed_token_in_origin: true,
    })
    .publish(&fixture.target())
    .unwrap();

  assert!(report.is_done());
  let add = &runner.calls_matching(&["remote", "add"])[0];
  assert_eq!(
    add.command().last().map(String::as_str),
    Some("https://ghp_embedded@github.com/octo/hello.git")
  );

  let push = &runner.pushes()[0];
  assert_eq!(push.args, push.command());
  assert_eq!(pushurl_token(&push.args), None);
}

#[test]
fn test_detached_head_fails_before_pushing() {
  let fixture = Fixture::with_stored_token("ghp_stored");
  let runner = ScriptedRunner::new().on(&["symbolic-ref"], CommandOutput::failed(1, ""));
  let prompt = ScriptedPrompt::new();

  let report = Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap();

  assert!(matches!(
    report.failure(),
    Some(FailureReason::StepFailed {
      step: "determine the current branch",
      ..
    })
  ));
  assert!(runner.pushes().is_empty());
  assert_eq!(report.push_attempts, 0);
}

#[test]
fn test_failed_remote_add_is_reported_as_step_failure() {
  let fixture = Fixture::with_stored_token("ghp_stored");
  let runner = ScriptedRunner::untracked_branch("main").on(
    &["remote", "add"],
    CommandOutput::failed(3, "error: remote origin already exists.\n"),
  );
  let prompt = ScriptedPrompt::new();

  let report = Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap();

  match report.failure() {
    Some(FailureReason::StepFailed { step, detail }) => {
      assert_eq!(*step, "add the origin remote");
      assert!(detail.contains("already exists"));
    }
    other => panic!("expected step failure, got {other:?}"),
  }
}

#[test]
fn test_token_under_deleted_key_is_captured_again() {
  let fixture = Fixture::with_stored_token("ghp_orphaned");
  fs::remove_file(fixture.vault.key_path()).unwrap();

  let runner = ScriptedRunner::untracked_branch("main");
  let prompt = ScriptedPrompt::new().with_token("ghp_recaptured");

  let report = Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap();

  assert!(report.is_done());
  assert_eq!(prompt.token_requests(), [TokenRequest::FirstUse]);
  assert_eq!(fixture.stored_token().as_deref(), Some("ghp_recaptured"));
}

#[test]
fn test_truncated_key_stops_publish_naming_the_key_file() {
  let fixture = Fixture::with_stored_token("ghp_before_crash");
  fs::write(fixture.vault.key_path(), b"").unwrap();

  let runner = ScriptedRunner::untracked_branch("main");
  let prompt = ScriptedPrompt::new().with_token("ghp_valid");

  let err = Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap_err();

  let message = format!("{err:#}");
  assert!(message.contains("Failed to save credentials"), "{message}");
  assert!(
    message.contains(&fixture.vault.key_path().display().to_string()),
    "{message}"
  );
  assert!(runner.pushes().is_empty());

  fs::remove_file(fixture.vault.key_path()).unwrap();
  let prompt = ScriptedPrompt::new().with_token("ghp_valid");
  let report = Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap();
  assert!(report.is_done());
  assert_eq!(fixture.stored_token().as_deref(), Some("ghp_valid"));
}

#[test]
fn test_record_without_token_keeps_identity_as_default() {
  let fixture = Fixture::new();
  fixture
    .vault
    .save(&CredentialRecord {
      username: "hubot".to_string(),
      email: "hubot@example.com".to_string(),
      token: None,
    })
    .unwrap();
  let runner = ScriptedRunner::untracked_branch("main");
  let prompt = ScriptedPrompt::new().with_token("ghp_first");

  let report = Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap();

  assert!(report.is_done());
  let record = fixture.vault.load().unwrap().unwrap();
  assert_eq!(record.username, "hubot");
  assert_eq!(record.email, "hubot@example.com");
}

#[test]
fn test_prepare_exposes_identity_before_pushing() {
  let fixture = Fixture::with_stored_token("ghp_stored");
  let runner = ScriptedRunner::untracked_branch("main");
  let prompt = ScriptedPrompt::new();
  let publisher = Publisher::new(&fixture.vault, &runner, &prompt);

  let prepared = match publisher.prepare().unwrap() {
    sprout_core::publish::Prepared::Ready(prepared) => prepared,
    sprout_core::publish::Prepared::Abandoned(report) => panic!("unexpected abandon: {report:?}"),
  };
  assert_eq!(prepared.identity().username, "octocat");
  assert!(runner.calls().is_empty());

  let report = publisher.finish(prepared, &fixture.target()).unwrap();
  assert!(report.is_done());
  assert_eq!(report.trace.first(), Some(&PublishState::Start));
}

#[test]
fn test_repo_path_is_passed_to_every_command() {
  let fixture = Fixture::with_stored_token("ghp_stored");
  let runner = ScriptedRunner::untracked_branch("main");
  let prompt = ScriptedPrompt::new();

  Publisher::new(&fixture.vault, &runner, &prompt)
    .publish(&fixture.target())
    .unwrap();

  assert!(!runner.calls().is_empty());
  assert!(
    runner
      .calls()
      .iter()
      .all(|call| call.repo_path == Path::new(fixture.repo_dir.path()))
  );
}
