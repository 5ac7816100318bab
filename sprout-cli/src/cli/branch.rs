//! # Branch Command
//!
//! Interactive branch manager. Each menu entry maps onto one
//! [`BranchManager`] operation; failures are reported and the menu stays open.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use dialoguer::{Input, Select};
use owo_colors::{Stream, Style};
use sprout_core::branches::{BranchManager, BranchSummary};
use sprout_core::output::{format_branch, format_repo_path, paint, print_header};
use sprout_core::prompts::sprout_theme;
use sprout_core::{CommandRunner, SystemGit, print_error, print_info, print_success};

use super::resolve_repository;

/// Arguments for the branch command
#[derive(Args)]
pub struct BranchArgs {
  /// Path to the repository (defaults to the current directory)
  #[arg(long, short = 'r', value_name = "PATH")]
  pub repo: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
  List,
  Create,
  Checkout,
  Merge,
  Delete,
  Revert,
  Graph,
  Exit,
}

impl MenuAction {
  const ALL: [MenuAction; 8] = [
    MenuAction::List,
    MenuAction::Create,
    MenuAction::Checkout,
    MenuAction::Merge,
    MenuAction::Delete,
    MenuAction::Revert,
    MenuAction::Graph,
    MenuAction::Exit,
  ];

  fn label(self) -> &'static str {
    match self {
      MenuAction::List => "List branches",
      MenuAction::Create => "Create branch",
      MenuAction::Checkout => "Checkout branch",
      MenuAction::Merge => "Merge branch into current",
      MenuAction::Delete => "Delete branch",
      MenuAction::Revert => "Revert commit",
      MenuAction::Graph => "Show commit graph",
      MenuAction::Exit => "Exit",
    }
  }
}

pub(crate) fn handle_branch_command(args: BranchArgs) -> Result<()> {
  let repo_path = resolve_repository(args.repo.as_deref())?;
  run_branch_menu(&SystemGit::default(), &repo_path)
}

/// Show the branch menu until the user picks "Exit".
pub(crate) fn run_branch_menu(runner: &dyn CommandRunner, repo_path: &Path) -> Result<()> {
  let manager = BranchManager::new(runner, repo_path);
  print_header(&format!(
    "Branch manager for {}",
    format_repo_path(&repo_path.display().to_string())
  ));

  loop {
    let labels: Vec<&str> = MenuAction::ALL.iter().map(|action| action.label()).collect();
    let choice = Select::with_theme(&sprout_theme())
      .with_prompt("Select an option")
      .items(labels)
      .default(0)
      .interact_opt()
      .context("Failed to read menu selection")?;

    let action = match choice {
      Some(index) => MenuAction::ALL[index],
      None => MenuAction::Exit,
    };
    if action == MenuAction::Exit {
      return Ok(());
    }

    if let Err(err) = run_action(&manager, action) {
      print_error(&format!("{err:#}"));
    }
  }
}

fn run_action(manager: &BranchManager<'_>, action: MenuAction) -> Result<()> {
  match action {
    MenuAction::List => {
      let branches = manager.list()?;
      if branches.is_empty() {
        print_info("No branches yet. Create a commit first.");
      }
      for branch in &branches {
        println!("{}", render_branch(branch));
      }
    }
    MenuAction::Create => {
      let name = ask("New branch name")?;
      manager.create(&name)?;
      print_success(&format!("Created {}", format_branch(&name)));
    }
    MenuAction::Checkout => {
      if let Some(name) = pick_local_branch(manager, "Branch to check out", true)? {
        manager.checkout(&name)?;
        print_success(&format!("Switched to {}", format_branch(&name)));
      }
    }
    MenuAction::Merge => {
      if let Some(name) = pick_local_branch(manager, "Branch to merge into the current branch", false)? {
        manager.merge(&name)?;
        print_success(&format!("Merged {}", format_branch(&name)));
      }
    }
    MenuAction::Delete => {
      if let Some(name) = pick_local_branch(manager, "Branch to delete", false)? {
        manager.delete(&name)?;
        print_success(&format!("Deleted {}", format_branch(&name)));
      }
    }
    MenuAction::Revert => {
      let commit = ask("Commit hash to revert")?;
      manager.revert(&commit)?;
      print_success(&format!("Reverted {commit}"));
    }
    MenuAction::Graph => {
      println!("{}", manager.graph()?);
    }
    MenuAction::Exit => {}
  }
  Ok(())
}

fn render_branch(branch: &BranchSummary) -> String {
  let marker = if branch.current {
    paint("*", Stream::Stdout, Style::new().green().bold())
  } else {
    " ".to_string()
  };
  let name = if branch.remote {
    paint(&branch.name, Stream::Stdout, Style::new().dimmed())
  } else {
    format_branch(&branch.name)
  };
  let commit = branch.last_commit.as_deref().unwrap_or("(no commits)");
  format!("{marker} {name}: {commit}")
}

fn ask(prompt: &str) -> Result<String> {
  let value: String = Input::with_theme(&sprout_theme())
    .with_prompt(prompt)
    .interact_text()
    .with_context(|| format!("Failed to read {}", prompt.to_lowercase()))?;
  Ok(value.trim().to_string())
}

/// Let the user pick a local branch. The current branch is offered only when
/// `include_current` is set.
fn pick_local_branch(manager: &BranchManager<'_>, prompt: &str, include_current: bool) -> Result<Option<String>> {
  let candidates: Vec<String> = manager
    .list()?
    .into_iter()
    .filter(|branch| !branch.remote && (include_current || !branch.current))
    .map(|branch| branch.name)
    .collect();

  if candidates.is_empty() {
    print_info("No other local branches.");
    return Ok(None);
  }

  let choice = Select::with_theme(&sprout_theme())
    .with_prompt(prompt)
    .items(&candidates)
    .default(0)
    .interact_opt()
    .context("Failed to read branch selection")?;

  Ok(choice.map(|index| candidates[index].clone()))
}
