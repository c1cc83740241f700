//! Error types for Tribunal

use thiserror::Error;

use crate::review::{ReviewTaskName, VoteValue};

/// Result type alias for Tribunal operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Tribunal operations
///
/// None of these are fatal. Callers recover by re-invoking the operation
/// once the underlying condition has been dealt with.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The proposal is not ready for review (reported by the caller)
    #[error("Precondition not met: {0}")]
    PreconditionNotMet(String),

    /// A vote was already recorded for this review request
    #[error("Vote already recorded for {request} ({existing}); original vote retained")]
    DuplicateVote {
        request: ReviewTaskName,
        existing: VoteValue,
    },

    /// A Task Store call failed or timed out
    #[error("Task store unavailable: {0}")]
    TaskStoreUnavailable(String),

    /// No review state exists for the proposal
    #[error("No review state for proposal {0}")]
    UnknownProposal(String),

    /// The review request was never issued
    #[error("Review request {0} was never issued")]
    UnknownReview(ReviewTaskName),

    /// The vote targets a round that a later round has replaced
    #[error("Review request {request} belongs to superseded round (latest is {latest})")]
    SupersededRound {
        request: ReviewTaskName,
        latest: u32,
    },

    /// The latest round still has pending votes
    #[error("Round {round} of {proposal} is still awaiting votes")]
    ReviewInProgress { proposal: String, round: u32 },

    /// The proposal already reached a terminal state
    #[error("Review of {proposal} already concluded ({status})")]
    AlreadyConcluded { proposal: String, status: String },

    /// The configured round bound was exceeded and the proposal escalated
    #[error("Review of {proposal} exhausted {max_rounds} rounds without consensus")]
    RoundsExhausted { proposal: String, max_rounds: u32 },

    /// A proposal or review task name could not be parsed
    #[error("Invalid name '{0}'")]
    InvalidName(String),

    /// Persistence backend error
    #[error("State store error: {0}")]
    StateStore(String),

    /// Another writer saved the proposal after this state was loaded
    #[error("Review state of {proposal} changed concurrently (expected revision {expected})")]
    StateConflict { proposal: String, expected: u64 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error leaves previously recorded state untouched and can
    /// simply be reported to the operator
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            Error::DuplicateVote { .. } | Error::ReviewInProgress { .. }
        )
    }
}
