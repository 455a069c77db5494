// Database configuration loaded from the environment
use crate::error::{DatabaseError, DatabaseResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_seconds: DEFAULT_ACQUIRE_TIMEOUT_SECONDS,
        }
    }

    /// Load from `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS` and
    /// `DATABASE_ACQUIRE_TIMEOUT_SECONDS`.
    ///
    /// # Errors
    ///
    /// Fails when `DATABASE_URL` is unset or a numeric setting does not parse.
    pub fn from_env() -> DatabaseResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`DatabaseConfig::from_env`] with an injectable variable source.
    ///
    /// # Errors
    ///
    /// Fails when `DATABASE_URL` is missing or a numeric setting does not parse.
    pub fn from_lookup<F>(lookup: F) -> DatabaseResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| DatabaseError::ConfigurationError("DATABASE_URL is required".to_string()))?;

        let mut config = Self::new(url);

        if let Some(raw) = lookup("DATABASE_MAX_CONNECTIONS") {
            config.max_connections = raw.trim().parse().map_err(|_| {
                DatabaseError::ConfigurationError(format!("Invalid DATABASE_MAX_CONNECTIONS: {raw}"))
            })?;
        }

        if let Some(raw) = lookup("DATABASE_ACQUIRE_TIMEOUT_SECONDS") {
            config.acquire_timeout_seconds = raw.trim().parse().map_err(|_| {
                DatabaseError::ConfigurationError(format!(
                    "Invalid DATABASE_ACQUIRE_TIMEOUT_SECONDS: {raw}"
                ))
            })?;
        }

        Ok(config)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

/// Mask credentials in a database URL before it is logged
pub fn mask_url(url: &str) -> String {
    if let (Some(at_pos), Some(scheme_end)) = (url.rfind('@'), url.find("://")) {
        if let (Some(scheme), Some(host_part)) = (url.get(..scheme_end + 3), url.get(at_pos..)) {
            if at_pos > scheme_end {
                return format!("{scheme}***:***{host_part}");
            }
        }
    }
    "***".to_string()
}
