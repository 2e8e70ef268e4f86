//! Generation requests.

use crate::engine::error::EngineError;
use crate::engine::result::CommitType;

/// Task-mode temperature when the caller does not pick one.
pub const DEFAULT_TASK_TEMPERATURE: f32 = 0.3;
/// Commit-mode temperature when the caller does not pick one.
pub const DEFAULT_COMMIT_TEMPERATURE: f32 = 0.2;
/// Token budget for concise task descriptions.
pub const DEFAULT_TASK_MAX_TOKENS: u32 = 1000;
/// Token budget for detailed task descriptions.
pub const DEFAULT_DETAILED_TASK_MAX_TOKENS: u32 = 2000;
/// Token budget for commit messages.
pub const DEFAULT_COMMIT_MAX_TOKENS: u32 = 300;
/// Upper bound accepted for `max_tokens`.
pub const MAX_TOKENS_LIMIT: u32 = 4000;
/// Upper bound accepted for `temperature`.
pub const MAX_TEMPERATURE: f32 = 2.0;

/// What kind of output is being asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Task description with TITLE/SUMMARY/TECHNICAL fields.
    Task {
        /// Ask for enumerated sub-bullets and a larger budget.
        detailed: bool,
    },
    /// Conventional commit message.
    Commit,
}

impl GenerationMode {
    /// Default sampling temperature for this mode.
    pub const fn default_temperature(self) -> f32 {
        match self {
            Self::Task { .. } => DEFAULT_TASK_TEMPERATURE,
            Self::Commit => DEFAULT_COMMIT_TEMPERATURE,
        }
    }

    /// Default token budget for this mode.
    pub const fn default_max_tokens(self) -> u32 {
        match self {
            Self::Task { detailed: false } => DEFAULT_TASK_MAX_TOKENS,
            Self::Task { detailed: true } => DEFAULT_DETAILED_TASK_MAX_TOKENS,
            Self::Commit => DEFAULT_COMMIT_MAX_TOKENS,
        }
    }
}

/// Caller-supplied directives for commit mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitHints {
    /// Force this commit type.
    pub commit_type: Option<CommitType>,
    /// Force this scope.
    pub scope: Option<String>,
    /// Mark the change as breaking.
    pub breaking: bool,
}

impl CommitHints {
    /// True when no directive is set.
    pub fn is_empty(&self) -> bool {
        self.commit_type.is_none() && self.scope.is_none() && !self.breaking
    }
}

/// An immutable, validated generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    diff_text: String,
    mode: GenerationMode,
    model_hint: Option<String>,
    temperature: f32,
    max_tokens: u32,
    commit_hints: Option<CommitHints>,
}

impl GenerationRequest {
    /// Starts building a request for `diff_text`.
    pub fn builder(diff_text: impl Into<String>, mode: GenerationMode) -> GenerationRequestBuilder {
        GenerationRequestBuilder {
            diff_text: diff_text.into(),
            mode,
            model_hint: None,
            temperature: None,
            max_tokens: None,
            commit_hints: None,
        }
    }

    /// The diff being described.
    pub fn diff_text(&self) -> &str {
        &self.diff_text
    }

    /// Requested output kind.
    pub const fn mode(&self) -> GenerationMode {
        self.mode
    }

    /// Requested model, if any.
    pub fn model_hint(&self) -> Option<&str> {
        self.model_hint.as_deref()
    }

    /// Sampling temperature, defaulted per mode.
    pub const fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Token budget, defaulted per mode.
    pub const fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Commit directives, only ever set in commit mode.
    pub fn commit_hints(&self) -> Option<&CommitHints> {
        self.commit_hints.as_ref()
    }
}

/// Builder for [`GenerationRequest`].
#[derive(Debug, Clone)]
pub struct GenerationRequestBuilder {
    diff_text: String,
    mode: GenerationMode,
    model_hint: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    commit_hints: Option<CommitHints>,
}

impl GenerationRequestBuilder {
    /// Requests a specific model (canonical or provider-native name).
    pub fn model(mut self, model: Option<String>) -> Self {
        self.model_hint = model.filter(|m| !m.trim().is_empty());
        self
    }

    /// Overrides the sampling temperature.
    pub fn temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Overrides the token budget.
    pub fn max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets commit directives. Ignored outside commit mode.
    pub fn commit_hints(mut self, hints: CommitHints) -> Self {
        self.commit_hints = Some(hints);
        self
    }

    /// Validates and freezes the request.
    pub fn build(self) -> Result<GenerationRequest, EngineError> {
        if self.diff_text.trim().is_empty() {
            return Err(EngineError::InvalidRequest(
                "diff is empty; stage some changes or pass --diff-file".to_string(),
            ));
        }

        let temperature = self
            .temperature
            .unwrap_or_else(|| self.mode.default_temperature());
        if !(0.0..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(EngineError::InvalidRequest(format!(
                "temperature must be between 0 and {MAX_TEMPERATURE}, got {temperature}"
            )));
        }

        let max_tokens = self
            .max_tokens
            .unwrap_or_else(|| self.mode.default_max_tokens());
        if !(1..=MAX_TOKENS_LIMIT).contains(&max_tokens) {
            return Err(EngineError::InvalidRequest(format!(
                "max tokens must be between 1 and {MAX_TOKENS_LIMIT}, got {max_tokens}"
            )));
        }

        let commit_hints = match self.mode {
            GenerationMode::Commit => self.commit_hints.filter(|h| !h.is_empty()),
            GenerationMode::Task { .. } => None,
        };

        Ok(GenerationRequest {
            diff_text: self.diff_text,
            mode: self.mode,
            model_hint: self.model_hint,
            temperature,
            max_tokens,
            commit_hints,
        })
    }
}
