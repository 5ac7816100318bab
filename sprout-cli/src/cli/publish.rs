//! # Publish Command
//!
//! Pushes an existing repository with the stored token and renders the
//! publish report.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use sprout_core::output::{format_branch, format_command, format_repo_path, print_header};
use sprout_core::publish::{FailureReason, PublishOutcome, PublishReport};
use sprout_core::{RemoteTarget, print_error, print_info, print_success, print_warning};

use super::{AppContext, resolve_repository};

/// Arguments for the publish command
#[derive(Args)]
pub struct PublishArgs {
  /// HTTPS URL of the remote repository (without credentials)
  #[arg(value_name = "REMOTE_URL")]
  pub remote_url: String,

  /// Path to the repository (defaults to the current directory)
  #[arg(long, short = 'r', value_name = "PATH")]
  pub repo: Option<PathBuf>,
}

pub(crate) fn handle_publish_command(args: PublishArgs) -> Result<ExitCode> {
  let repo_path = resolve_repository(args.repo.as_deref())?;
  let target = RemoteTarget::parse(&repo_path, &args.remote_url).context("Invalid remote URL")?;

  let context = AppContext::load()?;
  print_header(&format!(
    "Publishing {} to {}",
    format_repo_path(&repo_path.display().to_string()),
    target.remote_url()
  ));

  let report = context.publisher().publish(&target)?;
  Ok(render_report(&report))
}

/// Print the outcome of a publish attempt and map it to the exit code.
pub(crate) fn render_report(report: &PublishReport) -> ExitCode {
  match &report.outcome {
    PublishOutcome::Done { branch, set_upstream } => {
      if report.credential_writes > 0 {
        print_info("Credentials saved.");
      }
      let upstream = if *set_upstream { " and set as upstream" } else { "" };
      print_success(&format!("Pushed {}{upstream}.", format_branch(branch)));
      ExitCode::SUCCESS
    }
    PublishOutcome::Failed(reason) => {
      print_error(&capitalize(&reason.to_string()));
      match reason {
        FailureReason::PushRejected { class, detail, .. } => {
          if !detail.is_empty() {
            eprintln!("{detail}");
          }
          print_warning(class.hint());
        }
        FailureReason::UserAbandoned => {
          print_info(&format!(
            "Run {} to store a token, then try again.",
            format_command("sprout creds setup")
          ));
        }
        FailureReason::StepFailed { .. } => {}
      }
      ExitCode::FAILURE
    }
  }
}

fn capitalize(text: &str) -> String {
  let mut chars = text.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}
