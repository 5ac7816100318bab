//! # Command Line Interface
//!
//! Defines the CLI structure and command handlers for the sprout tool:
//! repository setup, publishing, credential management and the branch menu.

mod branch;
mod creds;
mod publish;
mod setup;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{ArgAction, Parser, Subcommand};
use sprout_core::publish::PublishOptions;
use sprout_core::{
  ColorMode, ConfigDirs, Publisher, SproutConfig, SystemGit, Vault, detect_repository_from_path, get_config_dirs,
};
use tracing::debug;

use crate::prompt::DialoguerPrompt;

/// Top-level CLI command for the sprout tool
#[derive(Parser)]
#[command(name = "sprout")]
#[command(display_name = "🌱 Sprout")]
#[command(about = "Bootstrap a local project into a remote Git repository")]
#[command(
  long_about = "Sprout turns a local project directory into a published Git repository.\n\n\
        It initializes the repository, records an initial commit and pushes it to an\n\
        HTTPS remote using an access token that is kept encrypted on disk. When a push\n\
        fails, sprout offers to replace the token and retries once."
)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
#[command(subcommand_required(true))]
#[command(disable_help_subcommand = true)]
#[command(max_term_width = 120)]
#[command(styles = Styles::styled()
    .header(AnsiColor::BrightGreen.on_default().bold().underline())
    .usage(AnsiColor::Green.on_default().bold())
    .literal(AnsiColor::BrightGreen.on_default().bold())
    .placeholder(AnsiColor::BrightWhite.on_default().italic())
    .valid(AnsiColor::Green.on_default())
    .invalid(AnsiColor::BrightRed.on_default().bold())
)]
pub struct Cli {
  /// Sets the level of verbosity (can be used multiple times)
  #[arg(
    short = 'v',
    long = "verbose",
    action = ArgAction::Count,
    global = true,
    long_help = "Sets the level of verbosity for tracing and logging output.\n\n\
             -v: Show info level messages\n\
             -vv: Show debug level messages, including every git command (tokens redacted)\n\
             -vvv: Show trace level messages"
  )]
  pub verbose: u8,

  /// Controls when colored output is used
  #[arg(
    long,
    value_enum,
    ignore_case = true,
    global = true,
    default_value_t = ColorMode::Auto,
  )]
  pub colors: ColorMode,

  /// Subcommands
  #[command(subcommand)]
  pub command: Commands,
}

/// Subcommands for the sprout tool
#[derive(Subcommand)]
pub enum Commands {
  /// Initialize, commit and publish a project in one go
  #[command(long_about = "Bootstraps a project directory and publishes it.\n\n\
            Runs git init (when needed), configures user.name and user.email from the stored\n\
            credentials, stages everything, records the initial commit, renames the branch to\n\
            the configured default and pushes it to REMOTE_URL.\n\n\
            Missing arguments are asked for interactively. Any existing 'origin' remote is\n\
            replaced by REMOTE_URL.")]
  Setup(setup::SetupArgs),

  /// Push the current branch with the stored token
  #[command(long_about = "Pushes the current branch of a repository to REMOTE_URL.\n\n\
            The stored access token is used (or asked for on first use). If the push fails,\n\
            sprout offers to replace the token and retries exactly once. Any existing\n\
            'origin' remote is replaced by REMOTE_URL.")]
  #[command(alias = "push")]
  Publish(publish::PublishArgs),

  /// Credential management
  #[command(long_about = "Manage the stored identity and access token.\n\n\
            The token is encrypted with a key kept next to it in sprout's data directory.\n\
            Deleting the key file makes the stored token unreadable; sprout will then ask\n\
            for a new one.")]
  #[command(arg_required_else_help = true)]
  Creds(creds::CredsArgs),

  /// Interactive branch manager
  #[command(long_about = "Opens an interactive menu to list, create, check out, merge and delete\n\
            branches, revert commits and show the commit graph.")]
  #[command(alias = "br")]
  Branch(branch::BranchArgs),
}

/// Everything a command handler needs, built once per invocation
pub(crate) struct AppContext {
  pub config_dirs: ConfigDirs,
  pub config: SproutConfig,
  pub vault: Vault,
  pub git: SystemGit,
  pub prompt: DialoguerPrompt,
}

impl AppContext {
  pub fn load() -> Result<Self> {
    let config_dirs = get_config_dirs()?;
    let config = config_dirs.load_config()?;
    debug!(?config, data_dir = %config_dirs.data_dir().display(), "Loaded configuration");

    Ok(Self {
      vault: Vault::from_config_dirs(&config_dirs),
      config_dirs,
      config,
      git: SystemGit::default(),
      prompt: DialoguerPrompt::new(),
    })
  }

  pub fn publisher(&self) -> Publisher<'_> {
    Publisher::new(&self.vault, &self.git, &self.prompt).with_options(PublishOptions::from(&self.config.publish))
  }
}

/// Resolve `--repo` (or the current directory) to the enclosing working tree.
pub(crate) fn resolve_repository(repo: Option<&Path>) -> Result<PathBuf> {
  let start = match repo {
    Some(path) => path.to_path_buf(),
    None => std::env::current_dir().context("Failed to get current directory")?,
  };

  detect_repository_from_path(&start).with_context(|| format!("{} is not inside a git repository", start.display()))
}

pub fn handle_cli(cli: Cli) -> Result<ExitCode> {
  cli.colors.apply();

  match cli.command {
    Commands::Setup(args) => setup::handle_setup_command(args),
    Commands::Publish(args) => publish::handle_publish_command(args),
    Commands::Creds(args) => creds::handle_creds_command(args).map(|()| ExitCode::SUCCESS),
    Commands::Branch(args) => branch::handle_branch_command(args).map(|()| ExitCode::SUCCESS),
  }
}
