use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum NumberingError {
    #[error("Confirmation required: execute permanently rewrites registration numbers")]
    ConfirmationRequired,

    #[error(
        "Retry budget exceeded for appointment {appointment_id} ({service_code}) after {attempts} attempts, last candidate {last_candidate}"
    )]
    RetryBudgetExceeded {
        appointment_id: Uuid,
        service_code: String,
        attempts: u32,
        last_candidate: String,
    },

    #[error("Registration numbering is already running")]
    AlreadyRunning,

    #[error("Malformed registration number: {0}")]
    MalformedNumber(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl NumberingError {
    /// Errors that abort a run and roll back every change made by it
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ConfirmationRequired)
    }
}

pub type Result<T> = std::result::Result<T, NumberingError>;
