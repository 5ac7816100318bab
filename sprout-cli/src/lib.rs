//! # Sprout CLI Library
//!
//! Command definitions, handlers and the terminal prompt implementation for
//! the sprout command-line tool.

pub mod cli;
pub mod prompt;
