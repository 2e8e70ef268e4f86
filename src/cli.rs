//! CLI interface for diffscribe.

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod config;
pub mod generate;
pub mod usage;

/// diffscribe: task descriptions and commit messages from git diffs.
#[derive(Parser)]
#[command(name = "diffscribe")]
#[command(
    about = "Generate task descriptions and conventional commit messages from git diffs",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// The main command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Describes the diff as a task (title, summary, technical notes).
    Task(generate::TaskCommand),
    /// Writes a conventional commit message for the diff.
    Commit(generate::CommitCommand),
    /// Shows community tier usage.
    Usage(usage::UsageCommand),
    /// Settings, API keys and model information.
    Config(config::ConfigCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Task(task_cmd) => task_cmd.execute().await,
            Commands::Commit(commit_cmd) => commit_cmd.execute().await,
            Commands::Usage(usage_cmd) => usage_cmd.execute(),
            Commands::Config(config_cmd) => config_cmd.execute(),
        }
    }
}
