//! Git plumbing used by the publisher, the bootstrap flow and the branch
//! manager.
//!
//! Every repository mutation goes through a [`CommandRunner`], which keeps the
//! external `git` executable behind a seam the tests can script.

pub mod detection;
pub mod runner;

pub use detection::detect_repository_from_path;
pub use runner::{CommandOutput, CommandRunner, SystemGit, redact_args};
