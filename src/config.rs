//! Configuration types.
//!
//! Everything is read once from the environment in `main` and handed to the
//! components that need it. Nothing below `main` touches `std::env`.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Default Gemini model, matching what the service was first deployed with.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_DB_PATH: &str = "./data/inbox-assist.db";

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    pub host: String,
    pub port: u16,
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    pub llm: LlmConfig,
}

impl AppConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("LLM_BACKEND") {
            Some(raw) => raw.parse::<LlmBackend>().map_err(|message| ConfigError::InvalidValue {
                key: "LLM_BACKEND".into(),
                message,
            })?,
            None => LlmBackend::Gemini,
        };

        let (key_var, default_model) = match backend {
            LlmBackend::Gemini => ("GEMINI_API_KEY", DEFAULT_GEMINI_MODEL),
            LlmBackend::Anthropic => ("ANTHROPIC_API_KEY", DEFAULT_ANTHROPIC_MODEL),
            LlmBackend::OpenAi => ("OPENAI_API_KEY", DEFAULT_OPENAI_MODEL),
        };

        let api_key = lookup(key_var)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(key_var.to_string()))?;

        let model = lookup("LLM_MODEL")
            // GEMINI_MODEL is what older .env files use.
            .or_else(|| lookup("GEMINI_MODEL").filter(|_| backend == LlmBackend::Gemini))
            .unwrap_or_else(|| default_model.to_string());

        let timeout_secs = parse_or(&lookup, "LLM_TIMEOUT_SECS", 60u64)?;

        let port = parse_or(&lookup, "INBOX_ASSIST_PORT", 8000u16)?;
        let host = lookup("INBOX_ASSIST_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let db_path = db_path_from_lookup(&lookup);

        Ok(Self {
            host,
            port,
            db_path,
            llm: LlmConfig {
                backend,
                api_key: SecretString::from(api_key),
                model,
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database path alone, for maintenance tools that never call the LLM.
pub fn db_path_from_env() -> PathBuf {
    db_path_from_lookup(&|key: &str| std::env::var(key).ok())
}

fn db_path_from_lookup<F>(lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    lookup("INBOX_ASSIST_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_gemini() {
        let config = AppConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "g-key")])).unwrap();
        assert_eq!(config.llm.backend, LlmBackend::Gemini);
        assert_eq!(config.llm.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.llm.api_key.expose_secret(), "g-key");
        assert_eq!(config.llm.timeout, Duration::from_secs(60));
        assert_eq!(config.port, 8000);
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "GEMINI_API_KEY"));
    }

    #[test]
    fn blank_api_key_is_an_error() {
        let err = AppConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    fn anthropic_backend_uses_its_own_key() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("LLM_BACKEND", "anthropic"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("GEMINI_MODEL", "gemini-pro"),
        ]))
        .unwrap();
        assert_eq!(config.llm.backend, LlmBackend::Anthropic);
        // GEMINI_MODEL only applies to the Gemini backend.
        assert_eq!(config.llm.model, DEFAULT_ANTHROPIC_MODEL);
    }

    #[test]
    fn legacy_gemini_model_variable() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "g"),
            ("GEMINI_MODEL", "gemini-2.0-flash"),
        ]))
        .unwrap();
        assert_eq!(config.llm.model, "gemini-2.0-flash");
    }

    #[test]
    fn invalid_port_is_reported() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "g"),
            ("INBOX_ASSIST_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "INBOX_ASSIST_PORT"));
    }

    #[test]
    fn unknown_backend_is_reported() {
        let err = AppConfig::from_lookup(lookup_from(&[("LLM_BACKEND", "llama")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "LLM_BACKEND"));
    }

    #[test]
    fn db_path_override() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "g"),
            ("INBOX_ASSIST_DB_PATH", "/tmp/inbox.db"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/inbox.db"));
        assert_eq!(
            db_path_from_lookup(&lookup_from(&[])),
            PathBuf::from(DEFAULT_DB_PATH)
        );
    }
}
