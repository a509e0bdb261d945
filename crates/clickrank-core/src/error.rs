//! Error types for clickrank

use thiserror::Error;

/// Core clickrank errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClickrankError {
    // Collaborator errors
    #[error("Score store error: {0}")]
    Store(String),

    #[error("Identity provider error: {0}")]
    Identity(String),

    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Account already exists: {0}")]
    AccountExists(String),

    // Validation errors
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    // Wire errors
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

impl ClickrankError {
    /// True when the error was caused by the caller's input rather than a collaborator
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ClickrankError::MissingField(_)
                | ClickrankError::AccountExists(_)
                | ClickrankError::InvalidMessage(_)
        )
    }
}

/// Result type for clickrank operations
pub type ClickrankResult<T> = Result<T, ClickrankError>;
