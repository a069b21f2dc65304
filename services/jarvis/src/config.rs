//! Application Configuration Module
//!
//! Loads settings from environment variables (and a `.env` file when present)
//! into a single struct built once in `main`.

use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use tracing::Level;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";
pub const DEFAULT_WAKE_WORD: &str = "jarvis";

/// Holds all configuration loaded from the environment.
#[derive(Debug)]
pub struct Config {
    pub openai_api_key: SecretString,
    pub openai_base_url: String,
    pub chat_model: String,
    pub transcription_model: String,
    pub wake_word: String,
    pub registry_path: Option<PathBuf>,
    pub speak_typed: bool,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    // *   `OPENAI_API_KEY`: Required. Used for chat and transcription.
    // *   `OPENAI_BASE_URL`: (Optional) API root. Defaults to the public OpenAI endpoint.
    // *   `CHAT_MODEL`: (Optional) Defaults to "gpt-4o-mini".
    // *   `TRANSCRIPTION_MODEL`: (Optional) Defaults to "whisper-1".
    // *   `WAKE_WORD`: (Optional) Defaults to "jarvis".
    // *   `JARVIS_REGISTRY`: (Optional) Path to a registry JSON file.
    // *   `SPEAK_TYPED_RESPONSES`: (Optional) "true" to also speak replies to typed input.
    // *   `RUST_LOG`: (Optional) "TRACE", "DEBUG", "INFO", "WARN" or "ERROR". Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Ignored if there is no .env file.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let openai_api_key = var("OPENAI_API_KEY")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidValue {
                var: "RUST_LOG".to_string(),
                value: log_level_str.clone(),
            })?;

        let speak_typed = match var("SPEAK_TYPED_RESPONSES") {
            Some(value) => parse_flag(&value).ok_or(ConfigError::InvalidValue {
                var: "SPEAK_TYPED_RESPONSES".to_string(),
                value,
            })?,
            None => false,
        };

        Ok(Self {
            openai_api_key,
            openai_base_url: var("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            chat_model: var("CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            transcription_model: var("TRANSCRIPTION_MODEL")
                .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            wake_word: var("WAKE_WORD").unwrap_or_else(|| DEFAULT_WAKE_WORD.to_string()),
            registry_path: var("JARVIS_REGISTRY").map(PathBuf::from),
            speak_typed,
            log_level,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_key_is_set() {
        let config = load(&[("OPENAI_API_KEY", "sk-test")]).unwrap();

        assert_eq!(config.openai_api_key.expose_secret(), "sk-test");
        assert_eq!(config.openai_base_url, DEFAULT_BASE_URL);
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.transcription_model, "whisper-1");
        assert_eq!(config.wake_word, "jarvis");
        assert_eq!(config.registry_path, None);
        assert!(!config.speak_typed);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn missing_key_is_an_error() {
        let err = load(&[("CHAT_MODEL", "gpt-4o")]).unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("OPENAI_API_KEY".into()));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        assert!(matches!(
            load(&[("OPENAI_API_KEY", "  ")]),
            Err(ConfigError::MissingVar(_))
        ));
    }

    #[test]
    fn overrides_are_read() {
        let config = load(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:8080/v1"),
            ("WAKE_WORD", "computer"),
            ("JARVIS_REGISTRY", "/etc/jarvis/registry.json"),
            ("SPEAK_TYPED_RESPONSES", "yes"),
            ("RUST_LOG", "debug"),
        ])
        .unwrap();

        assert_eq!(config.openai_base_url, "http://localhost:8080/v1");
        assert_eq!(config.wake_word, "computer");
        assert_eq!(
            config.registry_path,
            Some(PathBuf::from("/etc/jarvis/registry.json"))
        );
        assert!(config.speak_typed);
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert_eq!(
            load(&[("OPENAI_API_KEY", "sk"), ("RUST_LOG", "chatty")]).unwrap_err(),
            ConfigError::InvalidValue {
                var: "RUST_LOG".into(),
                value: "chatty".into()
            }
        );
        assert!(matches!(
            load(&[("OPENAI_API_KEY", "sk"), ("SPEAK_TYPED_RESPONSES", "maybe")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
