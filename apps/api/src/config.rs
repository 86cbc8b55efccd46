use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::evaluation::cache::DEFAULT_CACHE_CAPACITY;
use crate::evaluation::prompts::DEFAULT_PROMPT_CHAR_LIMIT;
use crate::llm_client::{DEFAULT_API_BASE, DEFAULT_MODEL};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub port: u16,
    pub prompt_char_limit: usize,
    pub cache_capacity: NonZeroUsize,
    pub generation_timeout: Duration,
    pub max_upload_bytes: usize,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("GEMINI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .context("Required environment variable 'GEMINI_API_KEY' is not set")?;

        Ok(Config {
            gemini_api_key: api_key,
            gemini_model: lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_api_base: lookup("GEMINI_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            prompt_char_limit: parse_or(&lookup, "PROMPT_CHAR_LIMIT", DEFAULT_PROMPT_CHAR_LIMIT)?,
            cache_capacity: parse_or(
                &lookup,
                "EVALUATION_CACHE_CAPACITY",
                NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )?,
            generation_timeout: Duration::from_secs(parse_or(
                &lookup,
                "GENERATION_TIMEOUT_SECS",
                DEFAULT_GENERATION_TIMEOUT_SECS,
            )?),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

// The API key must never end up in logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("gemini_api_key", &"<redacted>")
            .field("gemini_model", &self.gemini_model)
            .field("gemini_api_base", &self.gemini_api_base)
            .field("port", &self.port)
            .field("prompt_char_limit", &self.prompt_char_limit)
            .field("cache_capacity", &self.cache_capacity)
            .field("generation_timeout", &self.generation_timeout)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("rust_log", &self.rust_log)
            .finish()
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_apply() {
        let config = config(&[("GEMINI_API_KEY", "secret")]).unwrap();
        assert_eq!(config.gemini_model, DEFAULT_MODEL);
        assert_eq!(config.gemini_api_base, DEFAULT_API_BASE);
        assert_eq!(config.port, 3000);
        assert_eq!(config.prompt_char_limit, 3000);
        assert_eq!(config.cache_capacity.get(), 128);
        assert_eq!(config.generation_timeout, Duration::from_secs(60));
        assert_eq!(config.max_upload_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let err = config(&[]).unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
        assert!(config(&[("GEMINI_API_KEY", "  ")]).is_err());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = config(&[
            ("GEMINI_API_KEY", "secret"),
            ("PORT", "8080"),
            ("PROMPT_CHAR_LIMIT", "500"),
            ("EVALUATION_CACHE_CAPACITY", "4"),
            ("GENERATION_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.prompt_char_limit, 500);
        assert_eq!(config.cache_capacity.get(), 4);
        assert_eq!(config.generation_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_zero_cache_capacity_is_rejected() {
        let err = config(&[("GEMINI_API_KEY", "secret"), ("EVALUATION_CACHE_CAPACITY", "0")])
            .unwrap_err();
        assert!(err.to_string().contains("EVALUATION_CACHE_CAPACITY"));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = config(&[("GEMINI_API_KEY", "super-secret")]).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
