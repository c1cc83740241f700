//! Tribunal Core - three-axis review of proposals
//!
//! Every proposal is reviewed independently on three axes (correctness, test
//! quality, elegance). This crate names and spawns the review tasks, records
//! the ACCEPT or REVISE votes reviewers cast, and derives consensus.

pub mod config;
pub mod error;
pub mod persist;
pub mod review;
pub mod secrets;
pub mod store;
pub mod workflow;

pub use config::{Config, ExhaustionPolicy, ReviewConfig, StoreBackend};
pub use error::{Error, Result};
pub use persist::{MemoryStateStore, StateStore};
pub use review::{Axis, ProposalId, ReviewRequest, ReviewTaskName, Vote, VoteTag, VoteValue};
pub use secrets::Secrets;
pub use store::{CliTaskStore, MemoryTaskStore, TaskId, TaskStore};
pub use workflow::{
    Advance, ConsensusState, ProposalReviewState, ProposalStatus, ReviewCoordinator,
};
