//! Error types for database operations

use thiserror::Error;

/// Database error types
#[derive(Error, Debug)]
pub enum Error {
    /// SQLx database error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Another writer saved the proposal after this copy was loaded
    #[error("Review state of {proposal} changed concurrently (expected revision {expected})")]
    Conflict { proposal: String, expected: u64 },

    /// A stored row could not be turned back into review state
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for tribunal_core::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Conflict { proposal, expected } => {
                tribunal_core::Error::StateConflict { proposal, expected }
            }
            other => tribunal_core::Error::StateStore(other.to_string()),
        }
    }
}
