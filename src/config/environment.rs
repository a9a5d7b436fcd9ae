use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

use super::polling::load_poll_policies;
use crate::services::polling::{PollPolicy, SubjectKind, DEFAULT_RETAINED_FINISHED};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(String),
    #[error("{key} has invalid value {value:?}")]
    Invalid { key: String, value: String },
    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Environment configuration
/// Loads and validates environment variables; startup fails fast on error
#[derive(Debug, Clone, Validate)]
pub struct Config {
    #[validate(url(message = "SITE_API_BASE_URL must be a valid URL"))]
    pub api_base_url: String,
    pub bind_addr: SocketAddr,
    #[validate(range(min = 1, max = 300))]
    pub http_timeout_secs: u64,
    #[validate(range(min = 1))]
    pub rate_limit_per_minute: u32,
    #[validate(range(min = 1))]
    pub rate_limit_burst: u32,
    pub poll_policies: HashMap<SubjectKind, PollPolicy>,
    /// Finished sessions kept readable by the control API
    pub poll_retained_finished: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = lookup("SITE_API_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing("SITE_API_BASE_URL".to_string()))?;

        let config = Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            bind_addr: parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            http_timeout_secs: parse_or(&lookup, "HTTP_TIMEOUT_SECS", 30)?,
            rate_limit_per_minute: parse_or(&lookup, "RATE_LIMIT_PER_MINUTE", 600)?,
            rate_limit_burst: parse_or(&lookup, "RATE_LIMIT_BURST", 120)?,
            poll_policies: load_poll_policies(&lookup)?,
            poll_retained_finished: parse_or(
                &lookup,
                "POLL_RETAINED_FINISHED",
                DEFAULT_RETAINED_FINISHED,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Parse `key` if present, otherwise use `default`
pub(crate) fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}
