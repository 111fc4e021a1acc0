//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use wl_llm::Provider;

/// Git work log generator.
///
/// Reconstructs work sessions from commit history across one or more
/// repositories, detects parallel work, and renders a Markdown work log.
#[derive(Debug, Parser)]
#[command(name = "wl", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a work log report.
    Log(LogArgs),

    /// Print the computed sessions and parallel windows as JSON.
    Sessions(InputArgs),
}

/// Where commits come from and how they are grouped.
#[derive(Debug, Clone, Default, Args)]
pub struct InputArgs {
    /// Local repository path (repeatable).
    #[arg(long = "repo", value_name = "PATH")]
    pub repos: Vec<PathBuf>,

    /// JSON file with pre-fetched commit records (repeatable).
    #[arg(long = "commits", value_name = "FILE")]
    pub commit_files: Vec<PathBuf>,

    /// Start of the range (ISO 8601, YYYY-MM-DD, or e.g. "2 days ago"). Defaults to today.
    #[arg(long)]
    pub since: Option<String>,

    /// End of the range (ISO 8601, YYYY-MM-DD, or e.g. "1 hour ago"). Defaults to end of today.
    #[arg(long)]
    pub until: Option<String>,

    /// Use the last N days ending today. Overrides --since/--until.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub days: Option<u32>,

    /// Only include commits whose author name or email contains this text.
    #[arg(long)]
    pub author: Option<String>,

    /// Inactivity gap (minutes) that splits work sessions.
    #[arg(long)]
    pub gap_minutes: Option<i64>,

    /// Merge back-to-back parallel windows into one per continuous run.
    #[arg(long)]
    pub merge_windows: bool,
}

/// Options for `wl log`.
#[derive(Debug, Clone, Args)]
pub struct LogArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Report title.
    #[arg(long)]
    pub title: Option<String>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,

    /// Append an AI-generated summary.
    #[arg(long)]
    pub summary: bool,

    /// LLM provider for the summary.
    #[arg(long)]
    pub provider: Option<Provider>,

    /// Model name (defaults to the provider's default).
    #[arg(long)]
    pub model: Option<String>,

    /// Sampling temperature (0.0 to 2.0).
    #[arg(long)]
    pub temperature: Option<f32>,
}
