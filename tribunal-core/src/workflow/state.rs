//! Workflow state machine primitives
//!
//! Workflows expose their phase and guard transitions between phases. The
//! proposal review workflow is the only implementor today; the trait keeps
//! transition checking separate from the review bookkeeping.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::Result;

/// A workflow whose phase changes only through validated transitions
pub trait Workflow {
    /// The phase type for this workflow
    type Phase: Clone + PartialEq + Debug;

    /// Get the current phase of the workflow
    fn current_phase(&self) -> &Self::Phase;

    /// Check if a transition to the given phase is valid
    fn can_transition_to(&self, phase: &Self::Phase) -> bool;

    /// Attempt to transition to a new phase
    ///
    /// Returns an error if the transition is not valid.
    /// Implementations should log the transition.
    fn transition_to(&mut self, phase: Self::Phase) -> Result<()>;
}

/// Review status of one proposal
///
/// ```text
/// DRAFTED -> AWAITING_REVIEW(1) -> CONSENSUS
///                 |
///                 +--(any REVISE)--> AWAITING_REVIEW(n + 1)
///                 +--(round bound)--> ESCALATED | FORCE_ACCEPTED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    /// Proposal registered, no reviewers spawned yet
    #[default]
    Drafted,
    /// Reviewers for `round` have been spawned
    AwaitingReview { round: u32 },
    /// All three axes accepted in `round`
    Consensus { round: u32 },
    /// The round bound ran out and the proposal was handed to a human
    Escalated { round: u32 },
    /// The round bound ran out and the proposal was accepted anyway
    ForceAccepted { round: u32 },
}

impl ProposalStatus {
    /// Storage spelling of the status, without the round
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Drafted => "DRAFTED",
            ProposalStatus::AwaitingReview { .. } => "AWAITING_REVIEW",
            ProposalStatus::Consensus { .. } => "CONSENSUS",
            ProposalStatus::Escalated { .. } => "ESCALATED",
            ProposalStatus::ForceAccepted { .. } => "FORCE_ACCEPTED",
        }
    }

    /// The round the status refers to, if any
    pub fn round(&self) -> Option<u32> {
        match self {
            ProposalStatus::Drafted => None,
            ProposalStatus::AwaitingReview { round }
            | ProposalStatus::Consensus { round }
            | ProposalStatus::Escalated { round }
            | ProposalStatus::ForceAccepted { round } => Some(*round),
        }
    }

    /// Rebuild a status from its storage spelling and round
    pub fn from_parts(status: &str, round: Option<u32>) -> Option<Self> {
        match (status, round) {
            ("DRAFTED", None) => Some(ProposalStatus::Drafted),
            ("AWAITING_REVIEW", Some(round)) => Some(ProposalStatus::AwaitingReview { round }),
            ("CONSENSUS", Some(round)) => Some(ProposalStatus::Consensus { round }),
            ("ESCALATED", Some(round)) => Some(ProposalStatus::Escalated { round }),
            ("FORCE_ACCEPTED", Some(round)) => Some(ProposalStatus::ForceAccepted { round }),
            _ => None,
        }
    }

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalStatus::Consensus { .. }
                | ProposalStatus::Escalated { .. }
                | ProposalStatus::ForceAccepted { .. }
        )
    }

    /// Check if the proposal ended up accepted
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            ProposalStatus::Consensus { .. } | ProposalStatus::ForceAccepted { .. }
        )
    }

    /// Whether moving from `self` to `to` is allowed
    pub fn allows(&self, to: &ProposalStatus) -> bool {
        use ProposalStatus::*;

        match (*self, *to) {
            (Drafted, AwaitingReview { round }) => round == 1,
            (AwaitingReview { round: from }, AwaitingReview { round: to }) => to == from + 1,
            (AwaitingReview { round: from }, Consensus { round: to })
            | (AwaitingReview { round: from }, Escalated { round: to })
            | (AwaitingReview { round: from }, ForceAccepted { round: to }) => from == to,
            _ => false,
        }
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.round() {
            Some(round) => write!(f, "{}(round={})", self.as_str(), round),
            None => f.write_str(self.as_str()),
        }
    }
}
