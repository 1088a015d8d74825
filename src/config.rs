//! Client configuration from the environment

use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("GENDATA_BACKEND_URL must start with http:// or https://, got {0:?}")]
    InvalidBackendUrl(String),
    #[error("GENDATA_HTTP_TIMEOUT_SECS must be a positive number of seconds, got {0:?}")]
    InvalidTimeout(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the prompt service, without trailing slash
    pub backend_url: String,
    /// Per-request timeout. `None` waits indefinitely.
    pub http_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            http_timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend_url = match lookup("GENDATA_BACKEND_URL") {
            Some(url) => parse_backend_url(&url)?,
            None => DEFAULT_BACKEND_URL.to_string(),
        };

        let http_timeout = lookup("GENDATA_HTTP_TIMEOUT_SECS")
            .map(|raw| match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
                _ => Err(ConfigError::InvalidTimeout(raw)),
            })
            .transpose()?;

        Ok(Self {
            backend_url,
            http_timeout,
        })
    }
}

fn parse_backend_url(raw: &str) -> Result<String, ConfigError> {
    let url = raw.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.to_string())
    } else {
        Err(ConfigError::InvalidBackendUrl(raw.to_string()))
    }
}
