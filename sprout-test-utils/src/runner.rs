//! A scripted [`CommandRunner`] that records every invocation.
//!
//! Responses are matched by argument prefix after any leading `-c key=value`
//! overrides, so a rule for `["push"]` also answers
//! `git -c remote.origin.pushurl=... push -u origin main`. Commands without a
//! matching rule succeed with empty output.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::Result;
use sprout_core::{CommandOutput, CommandRunner};

struct Rule {
  prefix: Vec<String>,
  responses: VecDeque<CommandOutput>,
}

/// One recorded invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
  pub repo_path: PathBuf,
  pub args: Vec<String>,
}

impl RecordedCall {
  /// Arguments after any leading `-c key=value` pairs
  pub fn command(&self) -> &[String] {
    strip_overrides(&self.args)
  }

  /// Whether the command (ignoring overrides) starts with `prefix`
  pub fn starts_with(&self, prefix: &[&str]) -> bool {
    let command = self.command();
    command.len() >= prefix.len() && command.iter().zip(prefix).all(|(arg, expected)| arg == expected)
  }
}

#[derive(Default)]
pub struct ScriptedRunner {
  rules: RefCell<Vec<Rule>>,
  calls: RefCell<Vec<RecordedCall>>,
}

impl ScriptedRunner {
  pub fn new() -> Self {
    Self::default()
  }

  /// A repository on `branch` with no upstream, where every other command
  /// (including push) succeeds.
  pub fn untracked_branch(branch: &str) -> Self {
    Self::new()
      .on(&["symbolic-ref"], CommandOutput::ok(format!("{branch}\n")))
      .on(
        &["rev-parse", "--abbrev-ref"],
        CommandOutput::failed(128, format!("fatal: no upstream configured for branch '{branch}'\n")),
      )
  }

  /// A repository on `branch` tracking `origin/<branch>`.
  pub fn tracked_branch(branch: &str) -> Self {
    Self::new()
      .on(&["symbolic-ref"], CommandOutput::ok(format!("{branch}\n")))
      .on(&["rev-parse", "--abbrev-ref"], CommandOutput::ok(format!("origin/{branch}\n")))
  }

  /// Always answer commands starting with `prefix` with `output`.
  pub fn on(self, prefix: &[&str], output: CommandOutput) -> Self {
    self.on_sequence(prefix, vec![output])
  }

  /// Answer successive matching commands with `outputs` in order. The last
  /// output keeps answering once the others are used up.
  ///
  /// Later rules take precedence over earlier ones.
  pub fn on_sequence(self, prefix: &[&str], outputs: Vec<CommandOutput>) -> Self {
    self.rules.borrow_mut().insert(
      0,
      Rule {
        prefix: prefix.iter().map(|arg| (*arg).to_string()).collect(),
        responses: outputs.into(),
      },
    );
    self
  }

  /// Every recorded invocation, in order
  pub fn calls(&self) -> Vec<RecordedCall> {
    self.calls.borrow().clone()
  }

  /// Recorded invocations whose command starts with `prefix`
  pub fn calls_matching(&self, prefix: &[&str]) -> Vec<RecordedCall> {
    self
      .calls
      .borrow()
      .iter()
      .filter(|call| call.starts_with(prefix))
      .cloned()
      .collect()
  }

  /// Recorded push invocations
  pub fn pushes(&self) -> Vec<RecordedCall> {
    self.calls_matching(&["push"])
  }
}

impl CommandRunner for ScriptedRunner {
  fn run(&self, repo_path: &Path, args: &[&str]) -> Result<CommandOutput> {
    let call = RecordedCall {
      repo_path: repo_path.to_path_buf(),
      args: args.iter().map(|arg| (*arg).to_string()).collect(),
    };

    let mut rules = self.rules.borrow_mut();
    let output = rules
      .iter_mut()
      .find(|rule| call.starts_with(&rule.prefix.iter().map(String::as_str).collect::<Vec<_>>()))
      .and_then(|rule| {
        if rule.responses.len() > 1 {
          rule.responses.pop_front()
        } else {
          rule.responses.front().cloned()
        }
      })
      .unwrap_or_else(|| CommandOutput::ok(""));

    self.calls.borrow_mut().push(call);
    Ok(output)
  }
}

fn strip_overrides(args: &[String]) -> &[String] {
  let mut rest = args;
  while rest.len() >= 2 && rest[0] == "-c" {
    rest = &rest[2..];
  }
  rest
}
