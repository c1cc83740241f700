//! Review workflow
//!
//! `state` holds the proposal status machine, `proposal` the persisted review
//! record of one proposal, and `coordinator` drives both against the Task Store.

pub mod coordinator;
pub mod proposal;
pub mod state;

pub use coordinator::{Advance, ReviewCoordinator};
pub use proposal::{ConsensusState, ProposalReviewState};
pub use state::{ProposalStatus, Workflow};
