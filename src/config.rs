use crate::error::AnalyzeError;
use serde::Deserialize;
use std::{env, fs, path::Path};

/// Environment variable consulted for the API key when the config file
/// does not carry one.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Deployment configuration for the remote analysis backend.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzerConfig {
    /// Credential for the provider API. Optional here so the pipeline can
    /// report the missing-key precondition per entry instead of failing to
    /// construct; `require_api_key` is the gate.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_model() -> String {
    "claude-3-sonnet-20240229".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl AnalyzerConfig {
    /// Load config from a TOML file. A key present in the environment
    /// overrides one from the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let mut cfg: Self = toml::from_str(&content)?;
        if let Ok(key) = env::var(API_KEY_ENV) {
            cfg.api_key = Some(key);
        }
        Ok(cfg)
    }

    /// Defaults plus the key from the environment, if set.
    pub fn from_env() -> Self {
        Self {
            api_key: env::var(API_KEY_ENV).ok(),
            ..Self::default()
        }
    }

    /// Fatal precondition for any analysis: without a key no network call
    /// may be attempted.
    pub fn require_api_key(&self) -> Result<&str, AnalyzeError> {
        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(AnalyzeError::Configuration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AnalyzerConfig::default();
        assert_eq!(cfg.base_url, "https://api.anthropic.com");
        assert_eq!(cfg.max_tokens, 4096);
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let cfg = AnalyzerConfig::default();
        assert!(matches!(
            cfg.require_api_key(),
            Err(AnalyzeError::Configuration)
        ));

        let cfg = AnalyzerConfig {
            api_key: Some(String::new()),
            ..AnalyzerConfig::default()
        };
        assert!(matches!(
            cfg.require_api_key(),
            Err(AnalyzeError::Configuration)
        ));
    }

    #[test]
    fn test_toml_with_defaults() {
        let cfg: AnalyzerConfig = toml::from_str(r#"api_key = "sk-test""#).unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.model, "claude-3-sonnet-20240229");
    }
}
