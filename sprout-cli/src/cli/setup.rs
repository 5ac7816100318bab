//! # Setup Command
//!
//! The guided flow: ask for whatever is missing, bootstrap and publish the
//! project, then optionally open the branch menu.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Args;
use console::Term;
use dialoguer::Input;
use sprout_core::bootstrap::bootstrap_repository;
use sprout_core::output::{format_repo_path, print_header};
use sprout_core::prompts::sprout_theme;
use sprout_core::{CredentialPrompt, RemoteTarget, RemoteUrl, print_info};
use tracing::info;

use super::AppContext;
use super::publish::render_report;

/// Arguments for the setup command
#[derive(Args)]
pub struct SetupArgs {
  /// Local project directory (asked for when omitted)
  #[arg(value_name = "PATH")]
  pub path: Option<PathBuf>,

  /// HTTPS URL of the remote repository, without credentials (asked for when
  /// omitted)
  #[arg(value_name = "REMOTE_URL")]
  pub remote_url: Option<String>,

  /// Do not offer the branch menu after publishing
  #[arg(long = "no-branch-menu")]
  pub no_branch_menu: bool,
}

pub(crate) fn handle_setup_command(args: SetupArgs) -> Result<ExitCode> {
  let interactive = Term::stdout().is_term();
  if !interactive && (args.path.is_none() || args.remote_url.is_none()) {
    bail!("PATH and REMOTE_URL are required when not running in a terminal");
  }

  print_header("🌱 Sprout setup");

  let path = match args.path {
    Some(path) => path,
    None => PathBuf::from(ask_project_path()?),
  };
  let path = path
    .canonicalize()
    .with_context(|| format!("Project path {} does not exist", path.display()))?;

  let remote_url = match args.remote_url {
    Some(url) => RemoteUrl::parse(&url).context("Invalid remote URL")?,
    None => ask_remote_url()?,
  };
  let target = RemoteTarget::new(&path, remote_url);

  let context = AppContext::load()?;
  let report = bootstrap_repository(&context.publisher(), &context.config.publish, &target)?;

  if report.initialized {
    print_info(&format!(
      "Initialized repository in {}",
      format_repo_path(&path.display().to_string())
    ));
  }
  if !report.committed && report.publish.push_attempts > 0 {
    print_info("Nothing new to commit; pushed the existing history.");
  }

  let exit_code = render_report(&report.publish);
  if !report.publish.is_done() || args.no_branch_menu || !interactive {
    return Ok(exit_code);
  }

  if context
    .prompt
    .confirm("Manage branches interactively now?", true)?
  {
    info!(path = %path.display(), "Opening branch menu after setup");
    super::branch::run_branch_menu(&context.git, &path)?;
  }

  Ok(exit_code)
}

fn ask_project_path() -> Result<String> {
  Input::<String>::with_theme(&sprout_theme())
    .with_prompt("Project path (local)")
    .default(".".to_string())
    .interact_text()
    .context("Failed to read project path")
}

fn ask_remote_url() -> Result<RemoteUrl> {
  let raw = Input::<String>::with_theme(&sprout_theme())
    .with_prompt("Remote repository URL (HTTPS)")
    .validate_with(|value: &String| -> Result<(), String> {
      RemoteUrl::parse(value).map(|_| ()).map_err(|err| err.to_string())
    })
    .interact_text()
    .context("Failed to read remote URL")?;

  RemoteUrl::parse(&raw).context("Invalid remote URL")
}
