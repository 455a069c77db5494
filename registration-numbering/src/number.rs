use crate::error::NumberingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Digits in the zero-padded sequence part
pub const SEQUENCE_WIDTH: usize = 6;

/// Prefix of the values written during quarantine
pub const PLACEHOLDER_PREFIX: &str = "temp-";

/// Human-facing registration number, `{SERVICE_CODE}-{000001}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegistrationNumber {
    service_code: String,
    sequence: u32,
}

/// Canonical service code: trimmed, uppercased, ASCII letters and digits only.
///
/// `None` when the code cannot appear in a registration number that parses
/// back, e.g. `FH-2`, `Home Care` or `Ü`.
pub fn normalize_service_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    is_valid_service_code(&code).then_some(code)
}

fn is_valid_service_code(code: &str) -> bool {
    !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

impl RegistrationNumber {
    /// `service_code` must already be in the form [`normalize_service_code`] returns.
    pub fn new(service_code: impl Into<String>, sequence: u32) -> Self {
        Self {
            service_code: service_code.into(),
            sequence,
        }
    }

    pub fn service_code(&self) -> &str {
        &self.service_code
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Quarantine value for a row, unique because it embeds the row id
    pub fn placeholder(id: Uuid) -> String {
        format!("{PLACEHOLDER_PREFIX}{id}")
    }

    pub fn is_placeholder(value: &str) -> bool {
        value.starts_with(PLACEHOLDER_PREFIX)
    }
}

impl fmt::Display for RegistrationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:0width$}",
            self.service_code,
            self.sequence,
            width = SEQUENCE_WIDTH
        )
    }
}

impl FromStr for RegistrationNumber {
    type Err = NumberingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = || NumberingError::MalformedNumber(value.to_string());

        let (code, digits) = value.rsplit_once('-').ok_or_else(malformed)?;

        let digits_ok = digits.len() >= SEQUENCE_WIDTH && digits.chars().all(|c| c.is_ascii_digit());
        if !is_valid_service_code(code) || !digits_ok {
            return Err(malformed());
        }

        let sequence: u32 = digits.parse().map_err(|_| malformed())?;
        if sequence == 0 {
            return Err(malformed());
        }

        Ok(Self {
            service_code: code.to_string(),
            sequence,
        })
    }
}
