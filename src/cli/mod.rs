//! CLI module for the template deployer.
//!
//! This module provides the command-line interface for deploying and
//! inspecting notebook runtime templates.

mod commands;
mod output;

pub use commands::{Cli, Commands, LogFormat, OutputFormat};
pub use output::OutputFormatter;
