//! # Credentials Command
//!
//! Derive-based implementation of the credentials command for inspecting,
//! capturing and removing the encrypted credential record.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use sprout_core::output::{format_command, format_repo_path};
use sprout_core::vault::RecordStatus;
use sprout_core::{CredentialPrompt, CredentialRecord, TokenRequest, print_error, print_info, print_success, print_warning};

use super::AppContext;

/// Command for credential management
#[derive(Args)]
pub struct CredsArgs {
  /// The subcommand to execute
  #[command(subcommand)]
  pub subcommand: CredsSubcommands,
}

/// Subcommands for the creds command
#[derive(Subcommand)]
pub enum CredsSubcommands {
  /// Check whether usable credentials are stored
  #[command(long_about = "Reports whether the encryption key and credential record exist, whether\n\
                      the key file has owner-only permissions and whether the stored token can\n\
                      be decrypted. Nothing is created or modified.")]
  Check,

  /// Store an identity and access token interactively
  #[command(long_about = "Asks for the username, email and access token and stores them, replacing\n\
                      any existing record. The token is encrypted before it is written.")]
  Setup,

  /// Remove the stored credentials
  #[command(long_about = "Deletes the credential record. The encryption key is kept.")]
  Clear {
    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    yes: bool,
  },
}

pub(crate) fn handle_creds_command(creds: CredsArgs) -> Result<()> {
  let context = AppContext::load()?;

  match creds.subcommand {
    CredsSubcommands::Check => handle_check_command(&context),
    CredsSubcommands::Setup => handle_setup_command(&context),
    CredsSubcommands::Clear { yes } => handle_clear_command(&context, yes),
  }
}

fn handle_check_command(context: &AppContext) -> Result<()> {
  let status = context.vault.status().context("Failed to inspect credential storage")?;
  print_info(&format!(
    "Credential storage: {}",
    format_repo_path(&context.config_dirs.data_dir().display().to_string())
  ));

  match (status.key_present, status.key_well_formed, status.key_permissions_secure) {
    (false, ..) => print_info("No encryption key yet. One is created the first time a token is saved."),
    (true, Some(false), _) => {
      print_error("The key file is malformed. Stored tokens cannot be read and new ones cannot be saved.");
      println!(
        "Remove it to generate a new key, then store the token again: {}",
        format_command(&format!("rm {}", context.vault.key_path().display()))
      );
    }
    (true, _, Some(false)) => {
      print_warning("The key file has insecure permissions.");
      println!(
        "For security, change permissions to 600: {}",
        format_command(&format!("chmod 600 {}", context.vault.key_path().display()))
      );
    }
    (true, ..) => print_success("Encryption key found."),
  }

  let setup_hint = || {
    println!("Run {} to store a token.", format_command("sprout creds setup"));
  };
  match status.record {
    RecordStatus::Missing => {
      print_warning("No credentials stored.");
      setup_hint();
    }
    RecordStatus::Unreadable => {
      print_error("The credential file cannot be parsed.");
      setup_hint();
    }
    RecordStatus::NoToken { username } => {
      print_warning(&format!("Identity '{username}' is stored but no token has been captured."));
      setup_hint();
    }
    RecordStatus::Undecryptable { username } => {
      print_error(&format!(
        "The token stored for '{username}' cannot be decrypted with the current key."
      ));
      setup_hint();
    }
    RecordStatus::Readable { username, email } => {
      print_success(&format!("Credentials stored for {username} <{email}>."));
    }
  }

  Ok(())
}

fn handle_setup_command(context: &AppContext) -> Result<()> {
  let existing = context.vault.load().context("Failed to load stored credentials")?;
  if existing.as_ref().is_some_and(|record| record.token().is_some())
    && !context
      .prompt
      .confirm("A token is already stored. Replace it?", false)?
  {
    print_info("Setup cancelled.");
    return Ok(());
  }

  let current = existing.as_ref().map(CredentialRecord::identity);
  let identity = context.prompt.identity(current.as_ref())?;
  let Some(token) = context.prompt.token(TokenRequest::FirstUse)? else {
    print_warning("No token entered. Nothing was saved.");
    return Ok(());
  };

  context
    .vault
    .save(&CredentialRecord::new(identity, Some(token)))
    .context("Failed to save credentials")?;
  print_success("Credentials saved.");
  Ok(())
}

fn handle_clear_command(context: &AppContext, yes: bool) -> Result<()> {
  if !yes && !context.prompt.confirm("Remove the stored credentials?", false)? {
    print_info("Nothing removed.");
    return Ok(());
  }

  if context.vault.clear().context("Failed to remove credentials")? {
    print_success("Stored credentials removed.");
  } else {
    print_info("No credentials were stored.");
  }
  Ok(())
}
