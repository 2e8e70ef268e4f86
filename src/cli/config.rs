//! Configuration-related CLI commands.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{ConfigManager, LayeredSettings, Settings};
use crate::engine::model_map::MODELS_YAML;
use crate::engine::{CredentialResolver, ProviderId};

/// Configuration operations.
#[derive(Parser)]
pub struct ConfigCommand {
    /// Configuration subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

/// Configuration subcommands.
#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Shows effective settings and where each provider's key comes from.
    Show(ShowCommand),
    /// Stores an API key in the settings file.
    SetKey(SetKeyCommand),
    /// Shows the embedded models.yaml mapping table.
    Models(ModelsCommand),
}

/// Show command options.
#[derive(Parser)]
pub struct ShowCommand {}

/// Set-key command options.
#[derive(Parser)]
pub struct SetKeyCommand {
    /// Provider the key belongs to.
    pub provider: ProviderId,

    /// The API key.
    pub key: String,

    /// Write to ./.diffscribe.json instead of the global settings.
    #[arg(long)]
    pub project: bool,
}

/// Models command options.
#[derive(Parser)]
pub struct ModelsCommand {}

impl ConfigCommand {
    /// Executes the config command.
    pub fn execute(self) -> Result<()> {
        match self.command {
            ConfigSubcommands::Show(show_cmd) => show_cmd.execute(),
            ConfigSubcommands::SetKey(set_key_cmd) => set_key_cmd.execute(),
            ConfigSubcommands::Models(models_cmd) => models_cmd.execute(),
        }
    }
}

impl ShowCommand {
    /// Executes the show command.
    pub fn execute(self) -> Result<()> {
        let layers = LayeredSettings::load()?;
        let resolver = CredentialResolver::new(&layers);
        let effective = masked(&layers.effective());

        println!("Project settings: {}", ConfigManager::project_settings_path().display());
        println!("Global settings:  {}", ConfigManager::global_settings_path().display());
        println!(
            "{}",
            serde_json::to_string_pretty(&effective).context("Failed to serialize settings")?
        );
        println!();
        println!("API keys:");
        for provider in ProviderId::ALL {
            let status = match resolver.resolve_with_source(provider) {
                Some((key, source)) => format!("{} ({source})", mask_key(&key)),
                None => "not configured".to_string(),
            };
            println!("  {:<10} {status}", provider.as_str());
        }
        Ok(())
    }
}

impl SetKeyCommand {
    /// Executes the set-key command.
    pub fn execute(self) -> Result<()> {
        if self.key.trim().is_empty() {
            anyhow::bail!("API key must not be empty");
        }
        let manager = if self.project {
            ConfigManager::project()
        } else {
            ConfigManager::global()
        };
        manager.set_api_key(self.provider, &self.key)?;
        println!(
            "Saved {} API key to {}",
            self.provider.profile().display_name,
            manager.path().display()
        );
        Ok(())
    }
}

impl ModelsCommand {
    /// Executes the models command.
    pub fn execute(self) -> Result<()> {
        println!("{MODELS_YAML}");
        Ok(())
    }
}

fn masked(settings: &Settings) -> Settings {
    let mut settings = settings.clone();
    for key in settings.api_keys.values_mut() {
        *key = mask_key(key);
    }
    settings
}

/// Keeps the last four characters of a key.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.trim().chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_keys_are_fully_hidden() {
        assert_eq!(mask_key("abc"), "****");
        assert_eq!(mask_key("gsk_abcdefgh1234"), "****1234");
    }

    #[test]
    fn masked_settings_hide_every_key() {
        let mut settings = Settings::default();
        settings
            .api_keys
            .insert("openai".to_string(), "sk-proj-verysecret".to_string());
        let shown = serde_json::to_string(&masked(&settings)).unwrap();
        assert!(!shown.contains("verysecret"));
        assert!(shown.contains("****cret"));
    }
}
