//! Model name mapping between providers.
//!
//! The mapping table is embedded from `templates/models.yaml`. Callers ask
//! for a canonical model (or an alias, or a provider-native name) and get
//! back the concrete model string for the provider that will serve it.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::engine::provider::ProviderId;

/// Embedded mapping table, also printed by `diffscribe config models`.
pub const MODELS_YAML: &str = include_str!("templates/models.yaml");

/// One canonical model and its per-provider names.
#[derive(Debug, Deserialize, Clone)]
pub struct ModelEntry {
    /// Provider-neutral name used as the lookup key.
    pub canonical: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Alternative lookup keys.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Provider name -> provider-native model identifier.
    pub providers: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ModelTable {
    models: Vec<ModelEntry>,
}

/// Outcome of a model lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResolution {
    /// Concrete model to send to the provider.
    pub model: String,
    /// True when a requested model could not be mapped and the provider
    /// default was substituted.
    pub fell_back: bool,
}

/// Resolves requested models to provider-specific names.
pub struct ModelMapper {
    entries: Vec<ModelEntry>,
    by_name: HashMap<String, usize>,
    native: HashSet<(ProviderId, String)>,
}

impl ModelMapper {
    /// Loads the embedded table.
    pub fn load() -> Result<Self> {
        Self::from_yaml(MODELS_YAML)
    }

    /// Builds a mapper from a YAML table.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let table: ModelTable =
            serde_yaml::from_str(yaml).context("Failed to parse model mapping table")?;

        let mut by_name = HashMap::new();
        let mut native = HashSet::new();

        for (index, entry) in table.models.iter().enumerate() {
            by_name.insert(normalize(&entry.canonical), index);
            for alias in &entry.aliases {
                by_name.insert(normalize(alias), index);
            }
            for (provider_name, model) in &entry.providers {
                let provider: ProviderId = provider_name.parse().with_context(|| {
                    format!("Model '{}' maps an unknown provider", entry.canonical)
                })?;
                native.insert((provider, normalize(model)));
            }
        }

        Ok(Self {
            entries: table.models,
            by_name,
            native,
        })
    }

    /// All table entries.
    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    /// Resolves `requested` for `provider`.
    ///
    /// Unset → provider default. Known canonical name or alias with an entry
    /// for the provider → that entry. A model the provider already serves
    /// natively → unchanged. Anything else → provider default, with an
    /// informational notice.
    pub fn resolve(&self, requested: Option<&str>, provider: ProviderId) -> ModelResolution {
        let default_model = provider.profile().default_model;

        let Some(requested) = requested.map(str::trim).filter(|m| !m.is_empty()) else {
            return ModelResolution {
                model: default_model.to_string(),
                fell_back: false,
            };
        };

        let key = normalize(requested);

        if let Some(mapped) = self
            .by_name
            .get(&key)
            .and_then(|&index| self.entries[index].providers.get(provider.as_str()))
        {
            return ModelResolution {
                model: mapped.clone(),
                fell_back: false,
            };
        }

        if self.native.contains(&(provider, key)) {
            return ModelResolution {
                model: requested.to_string(),
                fell_back: false,
            };
        }

        info!(
            requested = %requested,
            provider = %provider,
            default_model = %default_model,
            "No mapping for requested model, using provider default"
        );
        ModelResolution {
            model: default_model.to_string(),
            fell_back: true,
        }
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Global mapper instance.
static MODEL_MAPPER: OnceLock<ModelMapper> = OnceLock::new();

/// Returns the global mapper built from the embedded table.
#[allow(clippy::expect_used)] // the embedded table is covered by tests
pub fn get_model_mapper() -> &'static ModelMapper {
    MODEL_MAPPER.get_or_init(|| ModelMapper::load().expect("Failed to load model mapping table"))
}
