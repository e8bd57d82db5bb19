use crate::llm::gemini::{GenerationSettings, DEFAULT_MODEL};
use crate::llm::GeminiClient;
use anyhow::{Context, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const APP_NAME: &str = "repair-advisor";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
const KEYRING_USER: &str = "gemini";

/// Persona and output-format contract sent as the system instruction
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = include_str!("../resources/system_instruction.md");

/// Settings stored in the platform config directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub model: String,
    pub base_url: String,
    /// Completed replies allowed per 24 hours, 0 for no limit
    pub daily_limit: u32,
    pub temperature: f32,
    pub max_output_tokens: usize,
    /// Replaces the built-in system instruction when set
    pub system_instruction_path: Option<PathBuf>,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        let generation = GenerationSettings::default();
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: GeminiClient::default_base_url(),
            daily_limit: 1,
            temperature: generation.temperature,
            max_output_tokens: generation.max_output_tokens,
            system_instruction_path: None,
        }
    }
}

impl AdvisorConfig {
    pub fn load() -> Result<Self> {
        let path = confy::get_configuration_file_path(APP_NAME, "config")?;
        debug!("Loading configuration from {}", path.display());
        confy::load(APP_NAME, "config")
            .with_context(|| format!("Failed to load configuration from {}", path.display()))
    }

    /// Command line values take precedence over the stored ones
    pub fn apply_overrides(
        &mut self,
        model: Option<String>,
        base_url: Option<String>,
        system_instruction: Option<PathBuf>,
    ) {
        if let Some(model) = model {
            self.model = model;
        }
        if let Some(base_url) = base_url {
            self.base_url = base_url;
        }
        if system_instruction.is_some() {
            self.system_instruction_path = system_instruction;
        }
    }

    pub fn generation(&self) -> GenerationSettings {
        GenerationSettings {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        }
    }

    pub fn system_instruction(&self) -> Result<String> {
        match &self.system_instruction_path {
            Some(path) => read_instruction(path),
            None => Ok(DEFAULT_SYSTEM_INSTRUCTION.to_string()),
        }
    }
}

fn read_instruction(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read system instruction from {}", path.display()))
}

/// Find the API key: environment first, then the OS keyring.
/// A missing key is not an error here; the provider reports it at session start.
pub fn resolve_api_key() -> Result<Option<String>> {
    resolve_api_key_with(|name| std::env::var(name).ok(), read_keyring)
}

fn read_keyring() -> Result<Option<String>> {
    let entry = Entry::new(APP_NAME, KEYRING_USER)?;
    match entry.get_password() {
        Ok(key) => Ok(Some(key)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e).with_context(|| "Failed to access keyring"),
    }
}

fn resolve_api_key_with(
    env: impl Fn(&str) -> Option<String>,
    keyring: impl FnOnce() -> Result<Option<String>>,
) -> Result<Option<String>> {
    if let Some(key) = env(API_KEY_ENV).filter(|key| !key.trim().is_empty()) {
        debug!("Using API key from {}", API_KEY_ENV);
        return Ok(Some(key));
    }
    let key = keyring()?;
    if key.is_some() {
        debug!("Using API key from keyring");
    }
    Ok(key)
}

/// Directory holding the usage record
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_defaults() {
        let config = AdvisorConfig::default();
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.daily_limit, 1);
        assert_eq!(config.generation(), GenerationSettings::default());
        assert!(config
            .system_instruction()
            .unwrap()
            .contains("json:service_proposal"));
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let config: AdvisorConfig = serde_json::from_str(r#"{"daily_limit": 5}"#).unwrap();
        assert_eq!(config.daily_limit, 5);
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_overrides() {
        let mut config = AdvisorConfig::default();
        config.apply_overrides(Some("gemini-2.5-pro".to_string()), None, None);
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.base_url, GeminiClient::default_base_url());

        config.apply_overrides(None, Some("http://localhost:9000".to_string()), None);
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.model, "gemini-2.5-pro");
    }

    #[test]
    fn test_system_instruction_from_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("persona.md");
        std::fs::write(&path, "Eres un asesor.")?;

        let mut config = AdvisorConfig::default();
        config.apply_overrides(None, None, Some(path));
        assert_eq!(config.system_instruction()?, "Eres un asesor.");

        config.system_instruction_path = Some(dir.path().join("missing.md"));
        assert!(config.system_instruction().is_err());
        Ok(())
    }

    #[test]
    fn test_env_key_wins_over_keyring() -> Result<()> {
        let key = resolve_api_key_with(
            |name| (name == API_KEY_ENV).then(|| "from-env".to_string()),
            || panic!("keyring should not be consulted"),
        )?;
        assert_eq!(key.as_deref(), Some("from-env"));
        Ok(())
    }

    #[test]
    fn test_blank_env_falls_back_to_keyring() -> Result<()> {
        let key = resolve_api_key_with(
            |_| Some("  ".to_string()),
            || Ok(Some("from-keyring".to_string())),
        )?;
        assert_eq!(key.as_deref(), Some("from-keyring"));

        let key = resolve_api_key_with(|_| None, || Ok(None))?;
        assert_eq!(key, None);

        let result = resolve_api_key_with(|_| None, || Err(anyhow!("locked")));
        assert!(result.is_err());
        Ok(())
    }
}
