//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_LOCATION;

/// dcloud - deploy notebook runtime templates to Vertex AI.
#[derive(Parser, Debug)]
#[command(name = "dcloud")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Cloud project id.
    #[arg(long, global = true, env = "DCLOUD_PROJECT")]
    pub project: Option<String>,

    /// Region hosting the templates.
    #[arg(long, global = true, env = "DCLOUD_LOCATION", default_value = DEFAULT_LOCATION)]
    pub location: String,

    /// API endpoint override.
    #[arg(long, global = true, env = "DCLOUD_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Only log warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "debug")]
    pub silent: bool,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Log line format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy a directory of templates, replacing changed ones.
    Deploy {
        /// Directory holding template files.
        #[arg(short, long)]
        templates: PathBuf,

        /// Number of templates reconciled concurrently.
        #[arg(long, env = "DCLOUD_THREADS", default_value = "1",
              value_parser = clap::value_parser!(u16).range(1..))]
        threads: u16,

        /// Show the plan without changing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// List remote templates.
    List,

    /// Delete a remote template by display name.
    Delete {
        /// Display name of the template.
        #[arg(short, long)]
        name: String,
    },

    /// Print a remote template as JSON.
    Export {
        /// Display name of the template.
        #[arg(short, long)]
        name: String,
    },

    /// Load and validate templates without contacting the registry.
    Validate {
        /// Directory holding template files.
        #[arg(short, long)]
        templates: PathBuf,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Log line format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable log lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}
