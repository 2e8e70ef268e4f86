//! Diff-to-text generation engine.

pub mod ai;
pub mod classify;
pub mod credentials;
pub mod error;
pub mod model_map;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod provider;
pub mod request;
pub mod result;
pub mod usage;

#[cfg(test)]
pub(crate) mod test_utils;

use std::collections::HashMap;
use std::sync::Arc;

pub use ai::{HttpRunner, ProviderCall, ProviderRunner};
pub use classify::FailureClass;
pub use credentials::{CredentialResolver, CredentialSource};
pub use error::{EngineError, ProviderFailure, QuotaPeriod};
pub use model_map::{get_model_mapper, ModelMapper};
pub use orchestrator::{EngineConfig, EngineOrchestrator};
pub use provider::{EngineSelection, ProviderId};
pub use request::{CommitHints, GenerationMode, GenerationRequest};
pub use result::{CommitResult, CommitType, Generation, GenerationOutcome, TaskResult};
pub use usage::{FileUsageStore, UsageTracker};

use crate::config::{LayeredSettings, Settings};

/// Caller-facing options for [`generate`].
///
/// Unset values fall back to the settings files, then to per-mode defaults.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Provider selection.
    pub engine: Option<EngineSelection>,
    /// Requested model.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Token budget.
    pub max_tokens: Option<u32>,
    /// Detailed task output.
    pub detailed: Option<bool>,
    /// Generate a commit message instead of a task description.
    pub commit_mode: bool,
    /// Forced commit type.
    pub commit_type: Option<CommitType>,
    /// Forced commit scope.
    pub scope: Option<String>,
    /// Mark the commit as breaking.
    pub breaking: bool,
    /// Widen an explicit engine to auto order on transient failure.
    pub fallback: Option<bool>,
    /// Keys that win over every configured source.
    pub api_key_overrides: HashMap<ProviderId, String>,
}

impl GenerateOptions {
    /// Combines these options with `settings` into a request and config.
    pub fn resolve(
        &self,
        diff_text: &str,
        settings: &Settings,
    ) -> Result<(GenerationRequest, EngineConfig), EngineError> {
        let engine = match (self.engine, settings.engine.as_deref()) {
            (Some(engine), _) => engine,
            (None, Some(name)) => name.parse()?,
            (None, None) => EngineSelection::Auto,
        };
        let config = EngineConfig {
            engine,
            fallback: self.fallback.or(settings.fallback).unwrap_or(false),
        };

        let mode = if self.commit_mode {
            GenerationMode::Commit
        } else {
            GenerationMode::Task {
                detailed: self.detailed.or(settings.detailed).unwrap_or(false),
            }
        };

        let request = GenerationRequest::builder(diff_text, mode)
            .model(self.model.clone().or_else(|| settings.model.clone()))
            .temperature(self.temperature.or(settings.temperature))
            .max_tokens(self.max_tokens.or(settings.max_tokens))
            .commit_hints(CommitHints {
                commit_type: self.commit_type,
                scope: self.scope.clone(),
                breaking: self.breaking,
            })
            .build()?;

        Ok((request, config))
    }
}

/// Generates a task description or commit message for `diff_text`.
///
/// Loads the project and global settings, counts community usage in
/// `~/.diffscribe/usage.json` and dispatches over HTTP.
pub async fn generate(
    diff_text: &str,
    options: &GenerateOptions,
) -> Result<GenerationOutcome, EngineError> {
    let layers = LayeredSettings::load().map_err(configuration_error)?;
    let store = FileUsageStore::new().map_err(configuration_error)?;
    let usage = Arc::new(UsageTracker::new(Box::new(store)));
    generate_with(
        diff_text,
        options,
        &layers,
        CredentialResolver::new(&layers),
        usage,
    )
    .await
}

/// [`generate`] with explicit settings, credentials and usage tracking.
pub async fn generate_with(
    diff_text: &str,
    options: &GenerateOptions,
    layers: &LayeredSettings,
    credentials: CredentialResolver,
    usage: Arc<UsageTracker>,
) -> Result<GenerationOutcome, EngineError> {
    let settings = layers.effective();
    let (request, config) = options.resolve(diff_text, &settings)?;

    let credentials = options
        .api_key_overrides
        .iter()
        .fold(credentials, |resolver, (&provider, key)| {
            resolver.with_override(provider, key.clone())
        });
    let runner = HttpRunner::from_settings(&settings, usage).map_err(configuration_error)?;

    EngineOrchestrator::new(runner, credentials)
        .dispatch(&request, &config)
        .await
}

fn configuration_error(err: anyhow::Error) -> EngineError {
    match err.downcast::<EngineError>() {
        Ok(engine_error) => engine_error,
        Err(other) => EngineError::Configuration(format!("{other:#}")),
    }
}
