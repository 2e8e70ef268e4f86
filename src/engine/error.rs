//! Engine error taxonomy.

use std::fmt;

use thiserror::Error;

use crate::engine::provider::ProviderId;

/// Which quota window was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaPeriod {
    /// Calendar day in local time.
    Daily,
    /// Calendar month in local time.
    Monthly,
}

impl fmt::Display for QuotaPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => f.write_str("daily"),
            Self::Monthly => f.write_str("monthly"),
        }
    }
}

/// A single failed provider attempt, kept for the aggregate error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    /// Provider that failed.
    pub provider: ProviderId,
    /// Rendered error message.
    pub message: String,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.message)
    }
}

/// Errors produced by the generation engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The request itself is invalid (empty diff, out-of-range parameters).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An explicitly requested provider has no credential configured.
    #[error(
        "No API key configured for {provider}. Set {env_var}, or run `diffscribe config set-key {provider} <key>`"
    )]
    MissingCredential {
        /// Provider lacking a key.
        provider: ProviderId,
        /// Environment variable that would supply it.
        env_var: &'static str,
    },

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Provider answered with a non-2xx status.
    #[error("{provider} API request failed: HTTP {status}: {body}")]
    Http {
        /// Provider that answered.
        provider: ProviderId,
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// Transport-level failure (connect, DNS, timeout).
    #[error("{provider} {message}")]
    Network {
        /// Provider being contacted.
        provider: ProviderId,
        /// Description, always mentioning `network error` or `request timeout`.
        message: String,
    },

    /// The shared community quota is used up.
    #[error(
        "Community {period} quota exhausted ({used}/{limit} requests). Configure your own API key to keep going"
    )]
    QuotaExceeded {
        /// Exhausted window.
        period: QuotaPeriod,
        /// Configured limit for the window.
        limit: u32,
        /// Requests already made in the window.
        used: u32,
    },

    /// Provider returned 2xx but the content is unusable.
    #[error("Malformed response from {provider}: {reason}")]
    MalformedResponse {
        /// Provider that answered.
        provider: ProviderId,
        /// What was missing or wrong.
        reason: String,
    },

    /// Every candidate failed.
    #[error("All engines failed:\n{}\n{}", format_failures(.attempts), .hint)]
    ExhaustedFallback {
        /// Every attempt in order, terminal attempt included.
        attempts: Vec<ProviderFailure>,
        /// What the user can do about it.
        hint: String,
        /// The terminal candidate's error, unchanged.
        #[source]
        terminal: Box<EngineError>,
    },
}

fn format_failures(attempts: &[ProviderFailure]) -> String {
    attempts
        .iter()
        .map(|failure| format!("  - {failure}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl EngineError {
    /// Returns the terminal error of an aggregate, or `self`.
    pub fn terminal(&self) -> &Self {
        match self {
            Self::ExhaustedFallback { terminal, .. } => terminal.terminal(),
            other => other,
        }
    }

    /// True when the community quota blocked the request, directly or as the
    /// terminal cause of an aggregate.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self.terminal(), Self::QuotaExceeded { .. })
    }
}
