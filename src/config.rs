//! Settings files.
//!
//! Two JSON files feed the engine: a project-local `.diffscribe.json` in the
//! current directory and a user-global `~/.diffscribe/settings.json`.
//! Project values win over global ones; command-line flags win over both.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::engine::{EngineError, ProviderId};

/// Contents of one settings file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// `auto` or a provider name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,

    /// Requested model (canonical or provider-native).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Fall back to auto order when an explicit engine fails transiently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,

    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Token budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Detailed task descriptions by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed: Option<bool>,

    /// Provider name -> API key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub api_keys: BTreeMap<String, String>,

    /// Provider name -> base URL override.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub endpoints: BTreeMap<String, String>,
}

impl Settings {
    /// Returns `self` with unset values filled from `lower`.
    pub fn layered_over(&self, lower: &Self) -> Self {
        let mut api_keys = lower.api_keys.clone();
        api_keys.extend(self.api_keys.clone());
        let mut endpoints = lower.endpoints.clone();
        endpoints.extend(self.endpoints.clone());

        Self {
            engine: self.engine.clone().or_else(|| lower.engine.clone()),
            model: self.model.clone().or_else(|| lower.model.clone()),
            fallback: self.fallback.or(lower.fallback),
            temperature: self.temperature.or(lower.temperature),
            max_tokens: self.max_tokens.or(lower.max_tokens),
            detailed: self.detailed.or(lower.detailed),
            api_keys,
            endpoints,
        }
    }

    /// API key stored for `provider`, ignoring blank values.
    pub fn api_key(&self, provider: ProviderId) -> Option<&str> {
        self.api_keys
            .get(provider.as_str())
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
    }

    /// Validated base URL override for `provider`.
    pub fn endpoint(&self, provider: ProviderId) -> Result<Option<Url>, EngineError> {
        self.endpoints
            .get(provider.as_str())
            .map(|raw| {
                Url::parse(raw.trim()).map_err(|e| {
                    EngineError::Configuration(format!(
                        "Invalid endpoint for {provider} '{raw}': {e}"
                    ))
                })
            })
            .transpose()
    }
}

/// Reads and writes one settings file.
pub struct ConfigManager {
    settings_path: PathBuf,
}

impl ConfigManager {
    /// Manager for the user-global file.
    pub fn global() -> Self {
        Self::with_path(Self::global_settings_path())
    }

    /// Manager for the project file in the current directory.
    pub fn project() -> Self {
        Self::with_path(Self::project_settings_path())
    }

    /// Manager with a custom settings path.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            settings_path: path,
        }
    }

    /// `~/.diffscribe/settings.json`.
    pub fn global_settings_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".diffscribe")
            .join("settings.json")
    }

    /// `./.diffscribe.json`.
    pub fn project_settings_path() -> PathBuf {
        PathBuf::from(".diffscribe.json")
    }

    /// Path this manager reads and writes.
    pub fn path(&self) -> &std::path::Path {
        &self.settings_path
    }

    /// Loads settings; a missing file yields defaults.
    pub fn load_settings(&self) -> Result<Settings> {
        if !self.settings_path.exists() {
            return Ok(Settings::default());
        }

        let content = std::fs::read_to_string(&self.settings_path).with_context(|| {
            format!(
                "Failed to read settings file: {}",
                self.settings_path.display()
            )
        })?;

        serde_json::from_str(&content).with_context(|| {
            format!(
                "Failed to parse settings file: {}",
                self.settings_path.display()
            )
        })
    }

    /// Writes settings, creating the parent directory when needed.
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self
            .settings_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory: {}", parent.display())
            })?;
        }

        let content =
            serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;

        std::fs::write(&self.settings_path, content).with_context(|| {
            format!(
                "Failed to write settings file: {}",
                self.settings_path.display()
            )
        })
    }

    /// Stores an API key for `provider`, keeping every other setting.
    pub fn set_api_key(&self, provider: ProviderId, key: &str) -> Result<()> {
        let mut settings = self.load_settings()?;
        settings
            .api_keys
            .insert(provider.as_str().to_string(), key.trim().to_string());
        self.save_settings(&settings)
    }
}

/// Project and global settings, loaded together.
#[derive(Debug, Clone, Default)]
pub struct LayeredSettings {
    /// Project-local file contents.
    pub project: Settings,
    /// User-global file contents.
    pub global: Settings,
}

impl LayeredSettings {
    /// Loads both files from their default locations.
    pub fn load() -> Result<Self> {
        Self::load_from(&ConfigManager::project(), &ConfigManager::global())
    }

    /// Loads both files through explicit managers.
    pub fn load_from(project: &ConfigManager, global: &ConfigManager) -> Result<Self> {
        Ok(Self {
            project: project.load_settings()?,
            global: global.load_settings()?,
        })
    }

    /// Project values over global values.
    pub fn effective(&self) -> Settings {
        self.project.layered_over(&self.global)
    }
}
