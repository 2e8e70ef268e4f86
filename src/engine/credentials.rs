//! API key lookup.

use std::collections::HashMap;
use std::fmt;

use crate::config::{LayeredSettings, Settings};
use crate::engine::provider::ProviderId;

/// Shared community key compiled into release builds, if any.
const BUILT_IN_COMMUNITY_KEY: Option<&str> = option_env!("DIFFSCRIBE_COMMUNITY_KEY");

/// Where a resolved key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Passed explicitly by the caller (`--api-key`).
    Override,
    /// `./.diffscribe.json`.
    ProjectSettings,
    /// `~/.diffscribe/settings.json`.
    GlobalSettings,
    /// `<PROVIDER>_API_KEY`.
    Environment,
    /// Compiled into the binary (community tier only).
    BuiltIn,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Override => "command line",
            Self::ProjectSettings => "project settings",
            Self::GlobalSettings => "global settings",
            Self::Environment => "environment",
            Self::BuiltIn => "built-in",
        };
        f.write_str(label)
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves the API key for a provider.
///
/// Lookup order: explicit override, project settings, global settings,
/// environment. Blank values are skipped as if unset.
pub struct CredentialResolver {
    overrides: HashMap<ProviderId, String>,
    project: Settings,
    global: Settings,
    env: EnvLookup,
    built_in_community: Option<String>,
}

impl CredentialResolver {
    /// Resolver over the given settings layers and the process environment.
    pub fn new(layers: &LayeredSettings) -> Self {
        Self {
            overrides: HashMap::new(),
            project: layers.project.clone(),
            global: layers.global.clone(),
            env: Box::new(|name| std::env::var(name).ok()),
            built_in_community: BUILT_IN_COMMUNITY_KEY.map(str::to_string),
        }
    }

    /// Resolver with no sources at all.
    pub fn empty() -> Self {
        Self {
            overrides: HashMap::new(),
            project: Settings::default(),
            global: Settings::default(),
            env: Box::new(|_| None),
            built_in_community: None,
        }
    }

    /// Adds an explicit key that wins over every other source.
    #[must_use]
    pub fn with_override(mut self, provider: ProviderId, key: impl Into<String>) -> Self {
        self.overrides.insert(provider, key.into());
        self
    }

    /// Replaces the environment lookup.
    #[must_use]
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }

    /// Replaces the compiled-in community key.
    #[must_use]
    pub fn with_built_in_community_key(mut self, key: Option<String>) -> Self {
        self.built_in_community = key;
        self
    }

    /// The key for `provider`, if any source has a non-blank one.
    pub fn resolve(&self, provider: ProviderId) -> Option<String> {
        self.resolve_with_source(provider).map(|(key, _)| key)
    }

    /// The key for `provider` and where it was found.
    pub fn resolve_with_source(&self, provider: ProviderId) -> Option<(String, CredentialSource)> {
        let layered = [
            (
                self.overrides.get(&provider).map(String::as_str),
                CredentialSource::Override,
            ),
            (
                self.project.api_key(provider),
                CredentialSource::ProjectSettings,
            ),
            (
                self.global.api_key(provider),
                CredentialSource::GlobalSettings,
            ),
        ];

        layered
            .into_iter()
            .find_map(|(key, source)| non_blank(key).map(|k| (k, source)))
            .or_else(|| {
                non_blank((self.env)(provider.profile().env_var).as_deref())
                    .map(|k| (k, CredentialSource::Environment))
            })
            .or_else(|| match provider {
                ProviderId::Community => non_blank(self.built_in_community.as_deref())
                    .map(|k| (k, CredentialSource::BuiltIn)),
                _ => None,
            })
    }

    /// True when at least one hosted provider has a key.
    pub fn has_any_hosted_credential(&self) -> bool {
        ProviderId::HOSTED_PREFERENCE
            .iter()
            .any(|&provider| self.resolve(provider).is_some())
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
