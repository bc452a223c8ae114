//! CLI module for the Bridge delivery tool.
//!
//! This module provides the command-line interface for delivering
//! services to Bridge nodes.

mod commands;
mod output;
mod prompt;

pub use commands::{Cli, Commands, DeliverArgs, OutputFormat};
pub use output::OutputFormatter;
pub use prompt::TerminalPrompt;
