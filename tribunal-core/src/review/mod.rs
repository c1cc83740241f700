//! Review vocabulary: axes, names, requests and votes
//!
//! This module holds the typed data the coordinator works on. Nothing in here
//! talks to the Task Store.

pub mod axis;
pub mod naming;
pub mod request;
pub mod tag;
pub mod vote;

pub use axis::Axis;
pub use naming::{ProposalId, ProposalKind, ReviewTaskName};
pub use request::{ReviewBrief, ReviewRequest};
pub use tag::VoteTag;
pub use vote::{Vote, VoteValue};
