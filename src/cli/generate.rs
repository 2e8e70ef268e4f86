//! `task` and `commit` commands.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser};
use serde::Serialize;

use crate::engine::{
    self, CommitType, EngineError, EngineSelection, GenerateOptions, Generation,
    GenerationOutcome, ProviderId,
};
use crate::git::{read_diff_file, DiffScope, GitRepository};

/// Options shared by every generating command.
#[derive(Args, Debug)]
pub struct EngineArgs {
    /// Provider to use: auto, groq, openai, community or local.
    #[arg(long, value_name = "ENGINE")]
    pub engine: Option<EngineSelection>,

    /// Model name (canonical, alias or provider-native).
    #[arg(long)]
    pub model: Option<String>,

    /// Sampling temperature (0 to 2).
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Maximum tokens in the completion.
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Fall back to other providers when the chosen engine fails transiently.
    #[arg(long)]
    pub fallback: bool,

    /// Disable fallback for this run even if settings enable it.
    #[arg(long, conflicts_with = "fallback")]
    pub no_fallback: bool,

    /// API key for the engine chosen with --engine.
    #[arg(long, requires = "engine", value_name = "KEY")]
    pub api_key: Option<String>,

    /// Read the diff from a file instead of git (`-` for stdin).
    #[arg(long, value_name = "FILE", conflicts_with = "unstaged")]
    pub diff_file: Option<PathBuf>,

    /// Describe unstaged working tree changes instead of the index.
    #[arg(long)]
    pub unstaged: bool,
}

impl EngineArgs {
    /// Loads the diff from the selected source.
    pub fn load_diff(&self) -> Result<String> {
        if let Some(path) = &self.diff_file {
            return read_diff_file(path);
        }
        let scope = if self.unstaged {
            DiffScope::Unstaged
        } else {
            DiffScope::Staged
        };
        GitRepository::open()?
            .diff(scope)
            .context("Failed to read diff from repository")
    }

    fn fallback_override(&self) -> Option<bool> {
        if self.fallback {
            Some(true)
        } else if self.no_fallback {
            Some(false)
        } else {
            None
        }
    }

    /// Options with only the command-line values filled in.
    pub fn options(&self) -> GenerateOptions {
        let mut api_key_overrides = HashMap::new();
        if let (Some(EngineSelection::Provider(provider)), Some(key)) = (self.engine, &self.api_key)
        {
            api_key_overrides.insert(provider, key.clone());
        }

        GenerateOptions {
            engine: self.engine,
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            fallback: self.fallback_override(),
            api_key_overrides,
            ..Default::default()
        }
    }
}

/// Task description options.
#[derive(Parser)]
pub struct TaskCommand {
    /// Shared engine and diff options.
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Ask for impact, acceptance criteria, risks and testing notes.
    #[arg(long)]
    pub detailed: bool,

    /// Print JSON instead of Markdown.
    #[arg(long)]
    pub json: bool,
}

impl TaskCommand {
    /// Executes the task command.
    pub async fn execute(self) -> Result<()> {
        let diff = self.engine.load_diff()?;
        let options = GenerateOptions {
            detailed: self.detailed.then_some(true),
            ..self.engine.options()
        };
        let outcome = run(&diff, &options).await?;
        print_outcome(&outcome, self.json)
    }
}

/// Commit message options.
#[derive(Parser)]
pub struct CommitCommand {
    /// Shared engine and diff options.
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Force the commit type (feat, fix, docs, ...).
    #[arg(long = "type", value_name = "TYPE")]
    pub commit_type: Option<CommitType>,

    /// Force the commit scope.
    #[arg(long)]
    pub scope: Option<String>,

    /// Mark the change as breaking.
    #[arg(long)]
    pub breaking: bool,

    /// Print JSON instead of the commit message.
    #[arg(long)]
    pub json: bool,
}

impl CommitCommand {
    /// Executes the commit command.
    pub async fn execute(self) -> Result<()> {
        let diff = self.engine.load_diff()?;
        let options = GenerateOptions {
            commit_mode: true,
            commit_type: self.commit_type,
            scope: self.scope.clone(),
            breaking: self.breaking,
            ..self.engine.options()
        };
        let outcome = run(&diff, &options).await?;
        print_outcome(&outcome, self.json)
    }
}

async fn run(diff: &str, options: &GenerateOptions) -> Result<GenerationOutcome> {
    match engine::generate(diff, options).await {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            if err.is_quota_exceeded() {
                eprintln!("{}", quota_help(&err));
            }
            Err(err.into())
        }
    }
}

/// Explains how to continue once the community quota is used up.
pub fn quota_help(err: &EngineError) -> String {
    let detail = match err.terminal() {
        EngineError::QuotaExceeded { period, .. } => format!("The {period} community quota is used up."),
        _ => "The community quota is used up.".to_string(),
    };
    format!(
        "{detail}\n\
         Add a personal API key to keep going:\n  \
         diffscribe config set-key {} <key>    (free keys at https://console.groq.com)\n  \
         diffscribe config set-key {} <key>\n\
         or export {} / {}.",
        ProviderId::Groq,
        ProviderId::OpenAi,
        ProviderId::Groq.profile().env_var,
        ProviderId::OpenAi.profile().env_var,
    )
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    provider: &'static str,
    model: &'a str,
    #[serde(flatten)]
    generation: &'a Generation,
}

fn print_outcome(outcome: &GenerationOutcome, json: bool) -> Result<()> {
    if json {
        let output = JsonOutput {
            provider: outcome.provider.as_str(),
            model: &outcome.model,
            generation: &outcome.generation,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialize output")?
        );
        return Ok(());
    }

    eprintln!(
        "Generated by {} ({})",
        outcome.provider.profile().display_name,
        outcome.model
    );
    match &outcome.generation {
        Generation::Task(task) => println!("{}", task.to_markdown()),
        Generation::Commit(commit) => println!("{}", commit.to_message()),
    }
    Ok(())
}
