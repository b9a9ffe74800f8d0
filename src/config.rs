//! Process-wide configuration
//!
//! Built once at startup from the environment (and `.env`), then shared
//! read-only via `Arc<Config>`.

use crate::error::AgentError;
use crate::Result;
use std::env;

/// Model every agent is bound to. Not selectable per request.
pub const MODEL_ID: &str = "gpt-4o-mini";

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_MAX_STEPS: usize = 20;

#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub model_id: String,
    pub debug: bool,
    pub host: String,
    pub port: u16,
    pub allowed_origin: String,
    pub max_steps: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model_id: MODEL_ID.to_string(),
            debug: false,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            allowed_origin: DEFAULT_ALLOWED_ORIGIN.to_string(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl Config {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                AgentError::ConfigError(format!("PORT must be a port number, got {:?}: {}", raw, e))
            })?,
            None => defaults.port,
        };

        let max_steps = match lookup("AGENT_MAX_STEPS") {
            Some(raw) => {
                let steps = raw.trim().parse::<usize>().map_err(|e| {
                    AgentError::ConfigError(format!(
                        "AGENT_MAX_STEPS must be a positive integer, got {:?}: {}",
                        raw, e
                    ))
                })?;
                if steps == 0 {
                    return Err(AgentError::ConfigError(
                        "AGENT_MAX_STEPS must be at least 1".to_string(),
                    ));
                }
                steps
            }
            None => defaults.max_steps,
        };

        Ok(Self {
            openai_api_key: lookup("OPENAI_API_KEY").unwrap_or_default(),
            openai_base_url: lookup("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.openai_base_url),
            model_id: defaults.model_id,
            debug: lookup("DEBUG").map(|v| is_truthy(&v)).unwrap_or(false),
            host: lookup("HOST").unwrap_or(defaults.host),
            port,
            allowed_origin: lookup("FRONTEND_ORIGIN").unwrap_or(defaults.allowed_origin),
            max_steps,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Default tracing filter directive for this configuration.
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}
