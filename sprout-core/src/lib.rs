//! # Sprout Core Library
//!
//! Core library for the sprout command-line tool. It owns the encrypted
//! credential vault, the authenticated remote publisher and the small amount
//! of git plumbing both of them need. The CLI crate supplies the terminal
//! prompt implementation and renders the results.

pub mod bootstrap;
pub mod branches;
pub mod config;
pub mod consts;
pub mod git;
pub mod output;
pub mod prompts;
pub mod publish;
pub mod remote;
pub mod secret;
pub mod vault;

// Re-export main types for the CLI and integration tests
pub use config::{ConfigDirs, IdentityScope, PublishConfig, SproutConfig, get_config_dirs};
pub use git::{CommandOutput, CommandRunner, SystemGit, detect_repository_from_path};
pub use output::{ColorMode, print_error, print_info, print_success, print_warning};
pub use prompts::{CredentialPrompt, Identity, TokenRequest};
pub use publish::{FailureReason, PublishOutcome, PublishReport, Publisher, RemoteTarget};
pub use remote::{AuthenticatedUrl, RemoteUrl, RemoteUrlError};
pub use secret::SecretToken;
pub use vault::{CredentialRecord, CryptoError, Key, Vault, VaultError};
