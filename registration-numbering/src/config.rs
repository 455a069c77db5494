use crate::error::{NumberingError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Assignment attempts per initial visit before the run is aborted
    pub max_attempts: u32,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl AllocatorConfig {
    /// # Errors
    ///
    /// Rejects a zero attempt budget.
    pub fn with_max_attempts(max_attempts: u32) -> Result<Self> {
        if max_attempts == 0 {
            return Err(NumberingError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self { max_attempts })
    }

    /// Reads `REGISTRATION_MAX_ATTEMPTS`, falling back to the default
    ///
    /// # Errors
    ///
    /// Fails when the variable is set but not a positive integer.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AllocatorConfig::from_env`] with an injectable variable source.
    ///
    /// # Errors
    ///
    /// Fails when `REGISTRATION_MAX_ATTEMPTS` is set but not a positive integer.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup("REGISTRATION_MAX_ATTEMPTS") {
            Some(raw) => {
                let max_attempts = raw.trim().parse().map_err(|_| {
                    NumberingError::InvalidConfig(format!("Invalid REGISTRATION_MAX_ATTEMPTS: {raw}"))
                })?;
                Self::with_max_attempts(max_attempts)
            }
            None => Ok(Self::default()),
        }
    }
}
