//! Session configuration parsed from environment variables.

use std::time::Duration;

use crate::transport::backoff::ReconnectPolicy;

pub const DEFAULT_SOCKET_PATH: &str = "/chat";
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_BASE_MS: u64 = 1000;
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 10_000;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("chat service URL is not configured; set TUTORCHAT_BASE_URL")]
    MissingBaseUrl,
    #[error("invalid chat service URL: {0} (expected http:// or https://)")]
    InvalidBaseUrl(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// HTTP(S) origin of the chat service, without trailing slash.
    pub base_url: String,
    pub socket_path: String,
    /// Page size for history requests.
    pub history_limit: u32,
    pub reconnect: ReconnectPolicy,
    pub connect_timeout: Duration,
}

impl SessionConfig {
    /// Config pointing at `base_url` with every other field defaulted.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            socket_path: DEFAULT_SOCKET_PATH.to_owned(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            reconnect: ReconnectPolicy {
                max_attempts: DEFAULT_RECONNECT_ATTEMPTS,
                base_delay: Duration::from_millis(DEFAULT_RECONNECT_BASE_MS),
                max_delay: Duration::from_millis(DEFAULT_RECONNECT_MAX_MS),
            },
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Build typed session config from environment variables.
    ///
    /// Required:
    /// - `TUTORCHAT_BASE_URL`
    ///
    /// Optional:
    /// - `TUTORCHAT_SOCKET_PATH`: default `/chat`
    /// - `TUTORCHAT_HISTORY_LIMIT`: default 50
    /// - `TUTORCHAT_RECONNECT_ATTEMPTS`: default 5
    /// - `TUTORCHAT_RECONNECT_BASE_MS`: default 1000
    /// - `TUTORCHAT_RECONNECT_MAX_MS`: default 10000
    /// - `TUTORCHAT_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the base URL is absent or malformed, or a
    /// numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SessionConfig::from_env`] with an injectable variable source.
    ///
    /// # Errors
    ///
    /// See [`SessionConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("TUTORCHAT_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingBaseUrl)?;
        let mut config = Self::new(base_url.trim());
        config.validate()?;

        if let Some(path) = lookup("TUTORCHAT_SOCKET_PATH").filter(|v| !v.is_empty()) {
            config.socket_path = if path.starts_with('/') { path } else { format!("/{path}") };
        }
        config.history_limit = parse_var(&lookup, "TUTORCHAT_HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT)?;
        config.reconnect.max_attempts =
            parse_var(&lookup, "TUTORCHAT_RECONNECT_ATTEMPTS", DEFAULT_RECONNECT_ATTEMPTS)?;
        config.reconnect.base_delay =
            Duration::from_millis(parse_var(&lookup, "TUTORCHAT_RECONNECT_BASE_MS", DEFAULT_RECONNECT_BASE_MS)?);
        config.reconnect.max_delay =
            Duration::from_millis(parse_var(&lookup, "TUTORCHAT_RECONNECT_MAX_MS", DEFAULT_RECONNECT_MAX_MS)?);
        config.connect_timeout =
            Duration::from_secs(parse_var(&lookup, "TUTORCHAT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?);

        Ok(config)
    }

    /// Check that the base URL is present and uses an HTTP(S) scheme.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingBaseUrl`] or [`ConfigError::InvalidBaseUrl`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        ws_origin(&self.base_url).map(|_| ())
    }

    /// WebSocket URL of the chat socket, derived from the HTTP base URL.
    ///
    /// # Errors
    ///
    /// See [`SessionConfig::validate`].
    pub fn socket_url(&self) -> Result<String, ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        Ok(format!("{}{}", ws_origin(&self.base_url)?, self.socket_path))
    }
}

fn ws_origin(base_url: &str) -> Result<String, ConfigError> {
    if let Some(rest) = base_url.strip_prefix("http://") {
        return Ok(format!("ws://{rest}"));
    }
    if let Some(rest) = base_url.strip_prefix("https://") {
        return Ok(format!("wss://{rest}"));
    }

    Err(ConfigError::InvalidBaseUrl(base_url.to_owned()))
}

fn parse_var<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
