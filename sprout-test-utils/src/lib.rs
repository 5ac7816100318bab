//! Test utilities shared across the sprout workspace
//!
//! This crate provides common testing infrastructure including:
//! - XDG directory mocking ([`EnvTestGuard`])
//! - Temporary git repositories ([`GitRepoTestGuard`])
//! - A scripted stand-in for the git executable ([`ScriptedRunner`])
//! - A scripted stand-in for the terminal prompts ([`ScriptedPrompt`])
//!
//! The clippy dead_code lint is disabled for this crate because test utilities
//! may not be used by all tests, and the compiler cannot detect usage across
//! crate boundaries in development dependencies.

#![allow(dead_code)]

pub mod env;
pub mod git;
pub mod prompt;
pub mod runner;

// Re-export commonly used items
pub use env::EnvTestGuard;
pub use git::{GitRepoTestGuard, create_commit};
pub use prompt::ScriptedPrompt;
pub use runner::ScriptedRunner;
