//! Startup configuration read from the process environment.

use crate::generation::chunk_source::{DEFAULT_CHUNK_SIZE, DEFAULT_DELAY_MS};
use crate::generation::gemini::{GeminiConfig, GEMINI_DEFAULT_BASE_URL, GEMINI_DEFAULT_MODEL};
use crate::generation::openai::{OpenAiConfig, OPENAI_DEFAULT_BASE_URL};
use crate::generation::{BackendSettings, ChunkOptions, SimulatedConfig};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub cors_origin: Option<String>,
    pub persist_every_fragment: bool,
    pub backends: BackendSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let host = get("APP_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or("APP_PORT", get("APP_PORT"), DEFAULT_PORT)?;

        let delay_ms = parse_or("SIMULATED_DELAY_MS", get("SIMULATED_DELAY_MS"), DEFAULT_DELAY_MS)?;
        let chunk_size = parse_or(
            "SIMULATED_CHUNK_SIZE",
            get("SIMULATED_CHUNK_SIZE"),
            DEFAULT_CHUNK_SIZE,
        )?;
        let persist_every_fragment = parse_or(
            "PERSIST_EVERY_FRAGMENT",
            get("PERSIST_EVERY_FRAGMENT"),
            true,
        )?;

        let gemini = get("GEMINI_API_KEY").map(|api_key| GeminiConfig {
            api_key,
            base_url: get("GEMINI_BASE_URL").unwrap_or_else(|| GEMINI_DEFAULT_BASE_URL.to_string()),
            model: get("GEMINI_MODEL").unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string()),
        });

        let openai = get("OPENAI_API_KEY").map(|api_key| OpenAiConfig {
            api_key,
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| OPENAI_DEFAULT_BASE_URL.to_string()),
        });

        Ok(Self {
            host,
            port,
            database_url,
            jwt_secret,
            cors_origin: get("CORS_ORIGIN"),
            persist_every_fragment,
            backends: BackendSettings {
                simulated: SimulatedConfig {
                    options: ChunkOptions::new(Duration::from_millis(delay_ms), chunk_size),
                    ..SimulatedConfig::default()
                },
                gemini,
                openai,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
