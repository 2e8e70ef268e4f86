//! Provider identities and their static profiles.

use std::fmt;
use std::str::FromStr;

use crate::engine::error::EngineError;

/// Backends that can turn a prompt into a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderId {
    /// First-class hosted provider (Groq).
    Groq,
    /// Secondary hosted provider (OpenAI).
    OpenAi,
    /// Community tier served with a shared key and a local quota.
    Community,
    /// User-configured local OpenAI-compatible endpoint (Ollama, LM Studio, ...).
    Local,
}

/// Informational rate-limit profile. Not enforced by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitProfile {
    /// Requests per minute, if the provider publishes one.
    pub requests_per_minute: Option<u32>,
    /// Tokens per minute, if the provider publishes one.
    pub tokens_per_minute: Option<u32>,
}

/// Static description of a provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderProfile {
    /// Stable lower-case name used in settings and on the command line.
    pub name: &'static str,
    /// Human-readable label.
    pub display_name: &'static str,
    /// Whether a user credential must be present before a request is built.
    pub requires_credential: bool,
    /// Model used when no model is requested or the mapping falls through.
    pub default_model: &'static str,
    /// Base URL that `/chat/completions` is appended to.
    pub base_url: &'static str,
    /// Environment variable holding the API key.
    pub env_var: &'static str,
    /// Published limits.
    pub rate_limit: RateLimitProfile,
}

const GROQ: ProviderProfile = ProviderProfile {
    name: "groq",
    display_name: "Groq",
    requires_credential: true,
    default_model: "llama-3.3-70b-versatile",
    base_url: "https://api.groq.com/openai/v1",
    env_var: "GROQ_API_KEY",
    rate_limit: RateLimitProfile {
        requests_per_minute: Some(30),
        tokens_per_minute: Some(6_000),
    },
};

const OPENAI: ProviderProfile = ProviderProfile {
    name: "openai",
    display_name: "OpenAI",
    requires_credential: true,
    default_model: "gpt-4o-mini",
    base_url: "https://api.openai.com/v1",
    env_var: "OPENAI_API_KEY",
    rate_limit: RateLimitProfile {
        requests_per_minute: Some(500),
        tokens_per_minute: Some(200_000),
    },
};

const COMMUNITY: ProviderProfile = ProviderProfile {
    name: "community",
    display_name: "Community (shared key)",
    requires_credential: false,
    default_model: "llama-3.1-8b-instant",
    base_url: "https://api.groq.com/openai/v1",
    env_var: "COMMUNITY_API_KEY",
    rate_limit: RateLimitProfile {
        requests_per_minute: Some(30),
        tokens_per_minute: Some(6_000),
    },
};

const LOCAL: ProviderProfile = ProviderProfile {
    name: "local",
    display_name: "Local endpoint",
    requires_credential: false,
    default_model: "llama3.2",
    base_url: "http://localhost:11434/v1",
    env_var: "LOCAL_API_KEY",
    rate_limit: RateLimitProfile {
        requests_per_minute: None,
        tokens_per_minute: None,
    },
};

impl ProviderId {
    /// Every provider, in declaration order.
    pub const ALL: [Self; 4] = [Self::Groq, Self::OpenAi, Self::Community, Self::Local];

    /// Hosted providers in auto-mode preference order.
    pub const HOSTED_PREFERENCE: [Self; 2] = [Self::Groq, Self::OpenAi];

    /// Returns the static profile for this provider.
    pub const fn profile(self) -> &'static ProviderProfile {
        match self {
            Self::Groq => &GROQ,
            Self::OpenAi => &OPENAI,
            Self::Community => &COMMUNITY,
            Self::Local => &LOCAL,
        }
    }

    /// Stable lower-case name.
    pub const fn as_str(self) -> &'static str {
        self.profile().name
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| {
                EngineError::Configuration(format!(
                    "Unknown engine '{s}'. Expected one of: auto, groq, openai, community, local"
                ))
            })
    }
}

/// Which provider(s) a dispatch may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineSelection {
    /// Hosted providers with credentials, then the community tier.
    #[default]
    Auto,
    /// A single provider.
    Provider(ProviderId),
}

impl fmt::Display for EngineSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Provider(p) => p.fmt(f),
        }
    }
}

impl FromStr for EngineSelection {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(Self::Auto)
        } else {
            s.parse().map(Self::Provider)
        }
    }
}
