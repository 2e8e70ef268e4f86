//! Failure classification for fallback decisions.
//!
//! The pattern table lives here and only here; adapters and the
//! orchestrator ask [`FailureClass::of`] instead of matching strings.

use crate::engine::error::EngineError;

/// Substrings (matched case-insensitively) that mark a transient failure.
pub const RETRYABLE_PATTERNS: &[&str] = &[
    "429",
    "503",
    "502",
    "timeout",
    "network",
    "temporarily",
    "rate limit",
    "quota",
];

/// How a failed attempt should influence dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Transient: rate limits, 5xx gateways, timeouts, network trouble.
    Retryable,
    /// The provider answered but its output was unusable.
    ProviderSpecific,
    /// The community quota is used up; the caller should offer key setup.
    QuotaExceeded,
    /// Misconfiguration or rejected credentials. Never silently skipped over.
    Fatal,
}

impl FailureClass {
    /// Classifies an engine error.
    pub fn of(err: &EngineError) -> Self {
        match err {
            EngineError::QuotaExceeded { .. } => Self::QuotaExceeded,
            EngineError::MissingCredential { .. }
            | EngineError::Configuration(_)
            | EngineError::InvalidRequest(_) => Self::Fatal,
            EngineError::MalformedResponse { .. } => Self::ProviderSpecific,
            EngineError::ExhaustedFallback { terminal, .. } => Self::of(terminal),
            EngineError::Http { .. } | EngineError::Network { .. } => {
                classify_message(&err.to_string())
            }
        }
    }

    /// Whether another provider is worth trying after this failure.
    pub const fn allows_fallback(self) -> bool {
        matches!(self, Self::Retryable | Self::ProviderSpecific)
    }
}

/// Classifies a free-form error message against [`RETRYABLE_PATTERNS`].
pub fn classify_message(message: &str) -> FailureClass {
    let lowered = message.to_lowercase();
    if RETRYABLE_PATTERNS.iter().any(|p| lowered.contains(p)) {
        FailureClass::Retryable
    } else {
        FailureClass::Fatal
    }
}
