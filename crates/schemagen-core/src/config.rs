//! Application configuration loaded from environment variables.
//!
//! | Variable                | Default                      |
//! |-------------------------|------------------------------|
//! | `OPENAI_API_KEY`        | (required for generation)    |
//! | `OPENAI_MODEL`          | `gpt-4o-mini`                |
//! | `OPENAI_BASE_URL`       | `https://api.openai.com/v1`  |
//! | `OPENAI_TEMPERATURE`    | `0.7`                        |
//! | `OPENAI_MAX_TOKENS`     | unset                        |
//! | `LLM_TIMEOUT_SECS`      | `60`                         |
//! | `DATABASE_URL`          | unset                        |
//! | `LOG_LEVEL`             | `info`                       |
//! | `SCHEMA_DIR`            | `prisma`                     |
//! | `SCHEMA_FILE`           | `schema.prisma`              |
//! | `PRISMA_BIN`            | `prisma`                     |
//! | `VALIDATE_TIMEOUT_SECS` | `60`                         |
//! | `MAX_ATTEMPTS`          | `3`                          |
//!
//! The binary loads a `.env` file before calling [`AgentConfig::from_env`].

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;

use crate::llm::LlmConfig;
use crate::store::{DEFAULT_SCHEMA_DIR, DEFAULT_SCHEMA_FILE};
use crate::validation::DEFAULT_MAX_ATTEMPTS;
use crate::validator::ValidatorConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: String,
        value: String,
        reason: String,
    },
}

/// Top-level application settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub llm: LlmConfig,
    pub validator: ValidatorConfig,
    pub schema_dir: PathBuf,
    pub schema_file: String,
    pub max_attempts: u32,
    /// Mentioned to the model when generating the datasource block.
    pub database_url: Option<String>,
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            validator: ValidatorConfig::default(),
            schema_dir: PathBuf::from(DEFAULT_SCHEMA_DIR),
            schema_file: DEFAULT_SCHEMA_FILE.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            database_url: None,
            log_level: "info".to_string(),
        }
    }
}

impl AgentConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the process environment.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.llm.api_key = get("OPENAI_API_KEY");
        if let Some(model) = get("OPENAI_MODEL") {
            config.llm.model = model;
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Some(t) = parse_var(&get, "OPENAI_TEMPERATURE")? {
            config.llm.temperature = t;
        }
        config.llm.max_tokens = parse_var(&get, "OPENAI_MAX_TOKENS")?;
        if let Some(secs) = parse_var(&get, "LLM_TIMEOUT_SECS")? {
            config.llm.timeout_secs = secs;
        }

        config.database_url = get("DATABASE_URL");
        if let Some(level) = get("LOG_LEVEL") {
            config.log_level = level;
        }

        if let Some(dir) = get("SCHEMA_DIR") {
            config.schema_dir = PathBuf::from(dir);
        }
        if let Some(file) = get("SCHEMA_FILE") {
            config.schema_file = file;
        }
        if let Some(max) = parse_var(&get, "MAX_ATTEMPTS")? {
            config.max_attempts = max;
        }

        if let Some(bin) = get("PRISMA_BIN") {
            config.validator.binary_path = bin;
        }
        if let Some(secs) = parse_var(&get, "VALIDATE_TIMEOUT_SECS")? {
            config.validator.timeout_secs = secs;
        }
        config.validator.scratch_dir = config.schema_dir.clone();

        Ok(config)
    }

    /// Point the store (and the validator's scratch files) at `dir`.
    pub fn with_schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema_dir = dir.into();
        self.validator.scratch_dir = self.schema_dir.clone();
        self
    }

    /// Tracing level for `log_level`; unknown names fall back to `INFO`.
    pub fn tracing_level(&self) -> Level {
        Level::from_str(self.log_level.trim()).unwrap_or(Level::INFO)
    }
}

fn parse_var<T, G>(get: &G, var: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                var: var.to_string(),
                reason: e.to_string(),
                value,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = AgentConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.schema_dir, PathBuf::from("prisma"));
        assert_eq!(config.schema_file, "schema.prisma");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.validator.binary_path, "prisma");
        assert_eq!(config.validator.scratch_dir, PathBuf::from("prisma"));
        assert!(config.llm.api_key.is_none());
        assert!(config.database_url.is_none());
        assert_eq!(config.tracing_level(), Level::INFO);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-4o"),
            ("OPENAI_TEMPERATURE", "0.2"),
            ("OPENAI_MAX_TOKENS", "2048"),
            ("DATABASE_URL", "postgresql://localhost/app"),
            ("LOG_LEVEL", "DEBUG"),
            ("SCHEMA_DIR", "db"),
            ("SCHEMA_FILE", "app.prisma"),
            ("PRISMA_BIN", "/usr/local/bin/prisma"),
            ("VALIDATE_TIMEOUT_SECS", "15"),
            ("MAX_ATTEMPTS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm.model, "gpt-4o");
        assert!((config.llm.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.llm.max_tokens, Some(2048));
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgresql://localhost/app")
        );
        assert_eq!(config.tracing_level(), Level::DEBUG);
        assert_eq!(config.schema_dir, PathBuf::from("db"));
        assert_eq!(config.schema_file, "app.prisma");
        assert_eq!(config.validator.binary_path, "/usr/local/bin/prisma");
        assert_eq!(config.validator.timeout_secs, 15);
        assert_eq!(config.validator.scratch_dir, PathBuf::from("db"));
        assert_eq!(config.max_attempts, 5);
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let config =
            AgentConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "  "), ("MAX_ATTEMPTS", "")]))
                .unwrap();
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = AgentConfig::from_lookup(lookup(&[("MAX_ATTEMPTS", "three")])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("MAX_ATTEMPTS"));
        assert!(msg.contains("three"));
    }

    #[test]
    fn test_unknown_log_level_falls_back_to_info() {
        let config = AgentConfig::from_lookup(lookup(&[("LOG_LEVEL", "chatty")])).unwrap();
        assert_eq!(config.tracing_level(), Level::INFO);
    }

    #[test]
    fn test_with_schema_dir_moves_scratch_dir() {
        let config = AgentConfig::default().with_schema_dir("/tmp/schemas");
        assert_eq!(config.schema_dir, PathBuf::from("/tmp/schemas"));
        assert_eq!(config.validator.scratch_dir, PathBuf::from("/tmp/schemas"));
    }
}
